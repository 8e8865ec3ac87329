//! Stability AI image generation endpoints

use axum::{
    extract::{Multipart, Path, Query, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::api::multipart::FormData;
use crate::error::{AppError, Result};
use crate::response::image::ValidationReport;
use crate::services::image_generation::{
    Constants, EducationalRequest, GeneratedImage, GenerationForm, GenerationSummary,
    HealthReport, ModelInfo, QuickRequest,
};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/image/health", get(health))
        .route("/image/constants", get(constants))
        .route("/image/educational-prompts", get(educational_prompts))
        .route("/image/model-info/:model_type", get(model_info))
        .route("/image/validate", post(validate))
        .route("/image/generate/core", post(generate_core))
        .route("/image/generate/sd35", post(generate_sd35))
        .route("/image/generate/ultra", post(generate_ultra))
        .route("/image/control/sketch", post(sketch_to_image))
        .route("/image/generate/educational", post(generate_educational))
        .route("/image/generate/quick", post(generate_quick))
}

/// Raw image bytes offered as a download
fn attachment(image: GeneratedImage) -> Response {
    (
        [
            (CONTENT_TYPE, format!("image/{}", image.output_format)),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename={}", image.filename),
            ),
        ],
        image.data,
    )
        .into_response()
}

fn generation_form(mut form: FormData) -> Result<GenerationForm> {
    Ok(GenerationForm {
        prompt: form.required("prompt")?,
        output_format: form.optional("output_format"),
        aspect_ratio: form.optional("aspect_ratio"),
        style_preset: form.optional("style_preset"),
        negative_prompt: form.optional("negative_prompt"),
        seed: form.parse("seed")?,
        mode: form.optional("mode"),
        model: form.optional("model"),
        strength: form.parse("strength")?,
        cfg_scale: form.parse("cfg_scale")?,
        control_strength: form.parse("control_strength")?,
        image: form.take_file("image"),
    })
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthReport> {
    Json(state.images.health())
}

async fn constants(State(state): State<Arc<AppState>>) -> Json<Constants> {
    Json(state.images.constants())
}

#[derive(Debug, Deserialize)]
struct SubjectQuery {
    subject: Option<String>,
}

async fn educational_prompts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SubjectQuery>,
) -> Json<Value> {
    Json(state.images.educational_prompts(query.subject.as_deref()))
}

async fn model_info(
    State(state): State<Arc<AppState>>,
    Path(model_type): Path<String>,
) -> Result<Json<ModelInfo>> {
    Ok(Json(state.images.model_info(&model_type)?))
}

async fn validate(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<ValidationReport>> {
    let mut form = FormData::read(multipart).await?;
    let file = form
        .take_file("image")
        .ok_or_else(|| AppError::InvalidRequest("Missing form field 'image'".into()))?;
    Ok(Json(state.images.validate(&file)))
}

async fn generate_core(State(state): State<Arc<AppState>>, multipart: Multipart) -> Result<Response> {
    let form = generation_form(FormData::read(multipart).await?)?;
    Ok(attachment(state.images.generate_core(form).await?))
}

async fn generate_sd35(State(state): State<Arc<AppState>>, multipart: Multipart) -> Result<Response> {
    let form = generation_form(FormData::read(multipart).await?)?;
    Ok(attachment(state.images.generate_sd35(form).await?))
}

async fn generate_ultra(State(state): State<Arc<AppState>>, multipart: Multipart) -> Result<Response> {
    let form = generation_form(FormData::read(multipart).await?)?;
    Ok(attachment(state.images.generate_ultra(form).await?))
}

async fn sketch_to_image(State(state): State<Arc<AppState>>, multipart: Multipart) -> Result<Response> {
    let form = generation_form(FormData::read(multipart).await?)?;
    Ok(attachment(state.images.generate_sketch(form).await?))
}

async fn generate_educational(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<GenerationSummary>> {
    let form = FormData::read(multipart).await?;
    let request = EducationalRequest {
        prompt: form.required("prompt")?,
        subject: form.required("subject")?,
        grade_level: form.optional("grade_level"),
        style: form.optional("style"),
        aspect_ratio: form.optional("aspect_ratio"),
        output_format: form.optional("output_format"),
    };
    Ok(Json(state.images.generate_educational(request).await?))
}

async fn generate_quick(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<GenerationSummary>> {
    let form = FormData::read(multipart).await?;
    let request = QuickRequest {
        prompt: form.required("prompt")?,
        style: form.optional("style"),
    };
    Ok(Json(state.images.generate_quick(request).await?))
}
