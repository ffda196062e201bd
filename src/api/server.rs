//! Axum API server for PromptGate.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use tower_http::trace::TraceLayer;

use crate::config::{ResponseShape, ServerConfig};
use crate::error::Result;
use crate::resolver::Resolver;

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared state for all API handlers.
#[derive(Clone)]
pub struct AppState {
    /// Resolution pipeline shared by every request task.
    pub resolver: Arc<Resolver>,
    /// Body shape of `POST /generate` responses, fixed for the process.
    pub response_shape: ResponseShape,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(resolver: Arc<Resolver>, response_shape: ResponseShape) -> Self {
        Self {
            resolver,
            response_shape,
            started_at: Utc::now(),
        }
    }
}

/// Build the axum router with all API routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/generate", post(super::routes::generate::generate))
        .route("/health", get(super::routes::health::get_health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Start the API server and run until Ctrl-C.
pub async fn start_server(config: &ServerConfig, state: AppState) -> Result<()> {
    let app = build_router(state);
    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("PromptGate listening on {addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
