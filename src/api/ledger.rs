//! Orchestration ledger endpoints.
//!
//! Failures here are also published as notices so a dashboard can surface
//! them the same way as mission failures.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use super::routes::AppState;
use super::types::{LedgerQuery, ReplayResponse, ShareResponse};
use crate::notify::NoticeSource;
use crate::orchestrator::{LedgerRecord, OrchestratorError};

fn ledger_error(state: &AppState, action: &str, e: OrchestratorError) -> (StatusCode, String) {
    let message = format!("{}: {}", action, e);
    state.notifier.notify(NoticeSource::Ledger, message.clone());
    (StatusCode::BAD_GATEWAY, message)
}

pub async fn list_ledger(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LedgerQuery>,
) -> Result<Json<Vec<LedgerRecord>>, (StatusCode, String)> {
    state
        .orchestrator
        .list_ledger(query.q.as_deref())
        .await
        .map(Json)
        .map_err(|e| ledger_error(&state, "Failed to load ledger", e))
}

pub async fn share(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ShareResponse>, (StatusCode, String)> {
    let ok = state
        .orchestrator
        .share(&id)
        .await
        .map_err(|e| ledger_error(&state, "Failed to share context", e))?;
    tracing::info!(id = %id, ok, "Shared ledger record");
    Ok(Json(ShareResponse { ok }))
}

/// Fetch a replay plan and load it into the mission monitor as the draft.
pub async fn replay(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ReplayResponse>, (StatusCode, String)> {
    let plan = state
        .orchestrator
        .replay(&id)
        .await
        .map_err(|e| ledger_error(&state, "Failed to replay mission", e))?;
    tracing::info!(id = %id, objective = %plan.objective, "Loaded replay plan");
    state.mission.load_replay(plan.clone()).await;
    Ok(Json(ReplayResponse { draft: plan }))
}
