//! Router, shared state and the server entry point.

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post, put},
    Json, Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::types::HealthResponse;
use super::{chat, ledger, mission, notifications, personas};
use crate::config::Config;
use crate::conversation::Coordinator;
use crate::llm::ProviderSet;
use crate::mission::MissionMonitor;
use crate::notify::Notifier;
use crate::orchestrator::OrchestratorClient;
use crate::persona;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub coordinator: Coordinator,
    pub mission: MissionMonitor,
    pub orchestrator: OrchestratorClient,
    pub notifier: Notifier,

    /// Cancelled when the server begins shutting down; ends open SSE streams
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Wire the components against the configured remote endpoints.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let notifier = Notifier::default();

        let providers = ProviderSet::http(&config.endpoints)?;
        let persona = persona::find(&config.default_persona).ok_or_else(|| {
            anyhow::anyhow!("Unknown DEFAULT_PERSONA: {}", config.default_persona)
        })?;
        let coordinator = Coordinator::new(
            providers,
            config.credentials.clone(),
            persona,
            notifier.clone(),
        );

        let orchestrator =
            OrchestratorClient::new(&config.orchestrator, config.endpoints.request_timeout)?;
        let mission = MissionMonitor::new(Arc::new(orchestrator.clone()), notifier.clone());

        Ok(Self {
            config,
            coordinator,
            mission,
            orchestrator,
            notifier,
            shutdown: CancellationToken::new(),
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/personas", get(personas::list_personas))
        .route("/api/personas/:name", get(personas::get_persona))
        .route("/api/chat", get(chat::get_conversation))
        .route("/api/chat/persona", post(chat::switch_persona))
        .route("/api/chat/messages", post(chat::send_message))
        .route("/api/chat/turns/:index/bookmark", post(chat::toggle_bookmark))
        .route("/api/chat/turns/:index/vote", post(chat::vote))
        .route("/api/chat/turns/:index/copy", get(chat::copy_turn))
        .route("/api/chat/bookmarks", get(chat::list_bookmarks))
        .route("/api/credentials", put(chat::set_credentials))
        .route(
            "/api/mission",
            get(mission::get_mission).post(mission::submit_mission),
        )
        .route("/api/ledger", get(ledger::list_ledger))
        .route("/api/ledger/:id/share", post(ledger::share))
        .route("/api/ledger/:id/replay", post(ledger::replay))
        .route("/api/notifications", get(notifications::stream))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server and run until Ctrl-C.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::new(config)?);
    let app = router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    let shutdown = state.shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.cancel();
        })
        .await?;

    state.mission.shutdown().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        orchestrator: state.config.orchestrator.base_url.clone(),
        default_persona: state.config.default_persona.clone(),
    })
}
