//! Conversation endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::routes::AppState;
use super::types::{
    BookmarkResponse, CopyResponse, CredentialsStatus, SendMessageRequest, SendMessageResponse,
    SwitchPersonaRequest, VoteRequest, VoteResponse,
};
use crate::conversation::{BookmarkDigest, ChatError, ConversationSnapshot};
use crate::llm::{Credentials, ProviderId};
use crate::persona;

fn chat_error(e: ChatError) -> (StatusCode, String) {
    let status = match e {
        ChatError::EmptyMessage => StatusCode::BAD_REQUEST,
        ChatError::Busy => StatusCode::CONFLICT,
        ChatError::TurnOutOfRange { .. } => StatusCode::NOT_FOUND,
    };
    (status, e.to_string())
}

pub async fn get_conversation(State(state): State<Arc<AppState>>) -> Json<ConversationSnapshot> {
    Json(state.coordinator.snapshot().await)
}

pub async fn switch_persona(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SwitchPersonaRequest>,
) -> Result<Json<ConversationSnapshot>, (StatusCode, String)> {
    let persona = persona::find(&req.name)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Unknown persona: {}", req.name)))?;
    state.coordinator.switch_persona(persona).await;
    Ok(Json(state.coordinator.snapshot().await))
}

/// Append the turn and fan the prompt out in the background.
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<SendMessageResponse>), (StatusCode, String)> {
    let pending = state
        .coordinator
        .begin_send(&req.text)
        .await
        .map_err(chat_error)?;
    let index = pending.index;

    let coordinator = state.coordinator.clone();
    tokio::spawn(async move {
        coordinator.complete_send(pending).await;
    });

    Ok((StatusCode::ACCEPTED, Json(SendMessageResponse { index })))
}

pub async fn toggle_bookmark(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> Result<Json<BookmarkResponse>, (StatusCode, String)> {
    let bookmarked = state
        .coordinator
        .toggle_bookmark(index)
        .await
        .map_err(chat_error)?;
    Ok(Json(BookmarkResponse { index, bookmarked }))
}

pub async fn vote(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
    Json(req): Json<VoteRequest>,
) -> Result<Json<VoteResponse>, (StatusCode, String)> {
    let vote = state
        .coordinator
        .vote(index, req.vote)
        .await
        .map_err(chat_error)?;
    Ok(Json(VoteResponse { index, vote }))
}

pub async fn copy_turn(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> Result<Json<CopyResponse>, (StatusCode, String)> {
    let text = state
        .coordinator
        .copy_text(index)
        .await
        .map_err(chat_error)?;
    Ok(Json(CopyResponse { text }))
}

pub async fn list_bookmarks(State(state): State<Arc<AppState>>) -> Json<Vec<BookmarkDigest>> {
    Json(state.coordinator.bookmarked_context().await)
}

pub async fn set_credentials(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<Credentials>,
) -> Json<CredentialsStatus> {
    let status = CredentialsStatus {
        gemini: credentials.for_provider(ProviderId::Gemini).is_some(),
        openai: credentials.for_provider(ProviderId::OpenAi).is_some(),
    };
    state.coordinator.set_credentials(credentials).await;
    Json(status)
}
