//! AI chat: single-shot, streamed over SSE, and history

use axum::{
    extract::{Multipart, Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::{Stream, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::api::multipart::FormData;
use crate::error::Result;
use crate::models::UserType;
use crate::services::chat::{Attachment, ChatHistory, ChatRequest, ChatResponse, StreamRequest};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat/ai", post(chat))
        .route("/chat/ai/stream", post(chat_stream))
        .route("/chat/history/:user_id/:session_id", get(history))
        .route("/chat/health", get(health))
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    Ok(Json(state.chat.chat(request).await?))
}

/// Form errors are rejected up front; later failures travel as `error` events
async fn chat_stream(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>>> {
    let mut form = FormData::read(multipart).await?;

    let attachments: Vec<Attachment> = form
        .take_files_with_prefix("file_")
        .into_iter()
        .map(|file| Attachment {
            name: file.file_name,
            content_type: file.content_type,
            data: file.data,
        })
        .collect();

    let request = StreamRequest {
        message: form.text("message").unwrap_or_default().to_string(),
        user_id: form.parse_required("user_id")?,
        session_id: form.parse_required("session_id")?,
        user_name: form.required("user_name")?,
        user_type: UserType::participant(&form.required("user_type")?)?,
        attachments,
    };

    info!(
        user_id = request.user_id,
        session_id = request.session_id,
        attachments = request.attachments.len(),
        "Starting chat stream"
    );

    let events = state
        .chat
        .stream(request)
        .map(|event| Event::default().json_data(event));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

async fn history(
    State(state): State<Arc<AppState>>,
    Path((user_id, session_id)): Path<(i64, i64)>,
) -> Result<Json<ChatHistory>> {
    Ok(Json(state.chat.history(user_id, session_id).await?))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": "chat" }))
}
