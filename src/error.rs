//! Common error types for the classroom gateway

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Database error: {0}")]
    Database(String),

    #[error("{provider} error: {message}")]
    Upstream {
        provider: &'static str,
        status: Option<u16>,
        message: String,
    },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Upstream provider failure, optionally carrying the provider's HTTP status
    pub fn upstream(provider: &'static str, status: Option<u16>, message: impl Into<String>) -> Self {
        AppError::Upstream {
            provider,
            status,
            message: message.into(),
        }
    }

    /// HTTP status this error is reported with
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Image(_) | AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::HttpClient(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Upstream { status, .. } => match status {
                // Provider 4xx statuses pass through
                Some(code) if (400..500).contains(code) => {
                    StatusCode::from_u16(*code).unwrap_or(StatusCode::BAD_GATEWAY)
                }
                _ => StatusCode::BAD_GATEWAY,
            },
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn kind(&self) -> (&'static str, Option<&'static str>) {
        match self {
            AppError::Config(_) | AppError::Internal(_) => ("server_error", None),
            AppError::Image(_) => ("invalid_request_error", Some("invalid_image")),
            AppError::InvalidRequest(_) => ("invalid_request_error", None),
            AppError::Conflict(_) => ("invalid_request_error", Some("already_exists")),
            AppError::HttpClient(_) => ("backend_error", None),
            AppError::Unauthorized(_) => ("authentication_error", Some("invalid_credentials")),
            AppError::Forbidden(_) => ("permission_error", Some("access_denied")),
            AppError::NotFound(_) => ("not_found_error", None),
            AppError::PayloadTooLarge(_) => ("invalid_request_error", Some("payload_too_large")),
            AppError::RateLimitExceeded => ("rate_limit_error", Some("rate_limit_exceeded")),
            AppError::Database(_) => ("database_error", None),
            AppError::Upstream { .. } => ("backend_error", Some("provider_error")),
            AppError::Timeout(_) => ("timeout_error", None),
        }
    }
}

/// Error response body.
///
/// `detail` carries the plain message that existing web clients read; `error`
/// holds the structured form.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub detail: String,
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
    pub code: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (error_type, code) = self.kind();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status, error = %message, "Request failed");
        } else {
            tracing::debug!(status = %status, error = %message, "Request rejected");
        }

        let body = Json(ErrorResponse {
            detail: message.clone(),
            error: ErrorDetail {
                message,
                r#type: error_type.to_string(),
                code: code.map(|c| c.to_string()),
            },
        });

        (status, body).into_response()
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
