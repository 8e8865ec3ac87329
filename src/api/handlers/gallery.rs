//! Session gallery endpoints

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::multipart::FormData;
use crate::error::{AppError, Result};
use crate::services::gallery::{
    DeleteResponse, GalleryListing, GalleryUpload, ItemResponse, StatsResponse, UploadResponse,
};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/gallery/upload", post(upload))
        .route("/gallery/session/:session_id", get(list))
        .route("/gallery/session/:session_id/stats", get(stats))
        .route("/gallery/item/:item_id", get(get_item))
        .route("/gallery/:item_id", delete(delete_item))
}

/// Caller identity passed as query parameters
#[derive(Debug, Deserialize)]
struct Caller {
    user_id: i64,
    user_type: String,
}

async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let mut form = FormData::read(multipart).await?;
    let file = form
        .take_file("image")
        .ok_or_else(|| AppError::InvalidRequest("Missing form field 'image'".into()))?;

    let upload = GalleryUpload {
        session_id: form.parse_required("session_id")?,
        user_id: form.parse_required("user_id")?,
        user_name: form.required("user_name")?,
        user_type: form.required("user_type")?,
        prompt: form.required("prompt")?,
        title: form.optional("title"),
        file,
    };

    let response = state.gallery.upload(upload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn list(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<i64>,
    Query(caller): Query<Caller>,
) -> Result<Json<GalleryListing>> {
    let listing = state
        .gallery
        .list(session_id, caller.user_id, &caller.user_type)
        .await?;
    Ok(Json(listing))
}

async fn stats(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<i64>,
    Query(caller): Query<Caller>,
) -> Result<Json<StatsResponse>> {
    let stats = state
        .gallery
        .stats(session_id, caller.user_id, &caller.user_type)
        .await?;
    Ok(Json(stats))
}

async fn get_item(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<i64>,
    Query(caller): Query<Caller>,
) -> Result<Json<ItemResponse>> {
    let item = state
        .gallery
        .get(item_id, caller.user_id, &caller.user_type)
        .await?;
    Ok(Json(item))
}

async fn delete_item(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<i64>,
    Query(caller): Query<Caller>,
) -> Result<Json<DeleteResponse>> {
    let deleted = state
        .gallery
        .delete(item_id, caller.user_id, &caller.user_type)
        .await?;
    Ok(Json(deleted))
}
