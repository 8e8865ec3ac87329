//! Main entry point for the Classroom Gateway

use classroom_gateway::{
    api,
    backend::{ChatClient, RestStore, StabilityClient},
    config::Settings,
    AppState,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_logging(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    if settings.logging.format == "pretty" {
        registry.with(fmt::layer().pretty()).init();
    } else {
        registry.with(fmt::layer().json()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    init_logging(&settings);
    settings.validate()?;

    info!(
        host = %settings.server.host,
        port = settings.server.port,
        database = %settings.database.url,
        chat_model = %settings.chat.model,
        "Starting Classroom Gateway"
    );

    let store = Arc::new(RestStore::new(&settings.database)?);
    let chat_model = Arc::new(ChatClient::new(&settings.chat)?);
    let image_generator = Arc::new(StabilityClient::new(&settings.image)?);

    if settings.chat.api_key.is_empty() {
        warn!("Chat API key is not configured; chat requests will fail");
    }
    if settings.image.api_key.is_empty() {
        warn!("Stability AI API key is not configured; image generation is disabled");
    }

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let state = Arc::new(AppState::new(settings, store, chat_model, image_generator));
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl-C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => warn!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown signal received");
}
