//! Triad Control - HTTP Server Entry Point
//!
//! Starts the HTTP server that exposes the conversation and mission API.

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use triad_control::{api, config::Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "triad_control=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!(
        orchestrator = %config.orchestrator.base_url,
        gemini_model = %config.endpoints.gemini_model,
        openai_model = %config.endpoints.openai_model,
        credentials = ?config.credentials,
        persona = %config.default_persona,
        "Loaded configuration"
    );

    api::serve(config).await?;

    Ok(())
}
