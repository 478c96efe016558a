//! Mission endpoints.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};

use super::routes::AppState;
use super::types::MissionStartedResponse;
use crate::mission::{MissionError, MissionPlan, MissionSnapshot};

pub async fn get_mission(State(state): State<Arc<AppState>>) -> Json<MissionSnapshot> {
    Json(state.mission.snapshot().await)
}

/// Start a mission. Returns once the event stream is open.
pub async fn submit_mission(
    State(state): State<Arc<AppState>>,
    Json(plan): Json<MissionPlan>,
) -> Result<(StatusCode, Json<MissionStartedResponse>), (StatusCode, String)> {
    match state.mission.submit(plan).await {
        Ok(instance_id) => Ok((
            StatusCode::CREATED,
            Json(MissionStartedResponse { instance_id }),
        )),
        Err(e @ (MissionError::EmptyObjective | MissionError::NoAgents)) => {
            Err((StatusCode::BAD_REQUEST, e.to_string()))
        }
        Err(MissionError::Start(e)) => Err((StatusCode::BAD_GATEWAY, format!("API Error: {}", e))),
        Err(e @ MissionError::Superseded) => Err((StatusCode::CONFLICT, e.to_string())),
    }
}
