//! Class session management

use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::Value;
use std::sync::Arc;

use crate::error::Result;
use crate::models::ClassSession;
use crate::services::teacher::{CreateClassRequest, CreateClassResponse};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/teacher/create-class", post(create_class))
        .route("/teacher/:teacher_id/sessions", get(list_sessions))
        .route("/teacher/session/:session_id", delete(delete_session))
}

async fn create_class(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateClassRequest>,
) -> Result<Json<CreateClassResponse>> {
    Ok(Json(state.teacher.create_class(request).await?))
}

async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Path(teacher_id): Path<i64>,
) -> Result<Json<Vec<ClassSession>>> {
    Ok(Json(state.teacher.list_sessions(teacher_id).await?))
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<i64>,
) -> Result<Json<Value>> {
    let deleted = state.teacher.delete_session(session_id).await?;
    state.chat.forget_session(session_id);
    Ok(Json(deleted))
}
