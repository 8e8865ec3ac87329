//! Router assembly and the cross-cutting layers

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    Router,
};
use std::{sync::Arc, time::Duration};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::warn;

use crate::api::handlers::{auth, chat, gallery, health, image, student, teacher};
use crate::config::CorsConfig;
use crate::middleware::RateLimitLayer;
use crate::AppState;

/// Credentialed CORS cannot use wildcards, so methods and headers mirror the request
fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origin = if config.allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::mirror_request()
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let settings = &state.settings;

    // Gallery and image routes are served both bare and under /api
    let legacy = Router::new()
        .merge(gallery::router())
        .merge(image::router());

    let mut router = Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(teacher::router())
        .merge(student::router())
        .merge(chat::router())
        .merge(gallery::router())
        .merge(image::router())
        .nest("/api", legacy)
        .layer(DefaultBodyLimit::max(settings.server.max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            settings.server.request_timeout_secs,
        )));

    if settings.rate_limit.enabled {
        router = router.layer(RateLimitLayer::new(
            settings.rate_limit.requests_per_second,
            settings.rate_limit.burst_size,
        ));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(cors_layer(&settings.cors))
        .with_state(state)
}
