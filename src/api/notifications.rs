//! Error notices as server-sent events.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::routes::AppState;

pub async fn stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.notifier.subscribe();
    let shutdown = state.shutdown.clone();
    let stream_id = Uuid::new_v4();
    tracing::info!(stream_id = %stream_id, "Notification stream opened");

    let stream = async_stream::stream! {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                result = rx.recv() => match result {
                    Ok(notice) => match Event::default().event("notice").json_data(&notice) {
                        Ok(sse) => yield Ok(sse),
                        Err(e) => {
                            tracing::error!(stream_id = %stream_id, error = %e, "Failed to serialize notice; dropping");
                        }
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(stream_id = %stream_id, skipped, "Notification stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        tracing::info!(stream_id = %stream_id, "Notification stream closed");
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(15))
            .text("keepalive"),
    )
}
