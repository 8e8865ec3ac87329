//! Root and liveness endpoints

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "Education System API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Always 200; the store's reachability is reported, not enforced
async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let database = match state.store.ping().await {
        Ok(()) => "reachable",
        Err(err) => {
            warn!(error = %err, "Database ping failed");
            "unreachable"
        }
    };

    Json(json!({
        "status": "healthy",
        "message": "Server is running",
        "database": database,
    }))
}
