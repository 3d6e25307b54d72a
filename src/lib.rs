// ECG ingestion server
//
// Receives ECG batches over HTTP, resolves the sending device to its user,
// derives HRV metrics and persists an enriched reading. Anything that cannot
// be stored remotely lands in the local fallback log.
//
// Features:
// - Axum HTTP server (HTTP/1.1, HTTP/2)
// - Filesystem or S3 document store
// - Periodic device registry refresh
// - Structured logging with tracing
// - Graceful shutdown

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ecgingest_config::RuntimeConfig;
use ecgingest_handlers::IngestionPipeline;
use ecgingest_registry::RefreshScheduler;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

mod handlers;
mod init;

use handlers::{handle_post_data, health_check, ready_check};
pub use init::{init_pipeline, init_tracing};

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<IngestionPipeline>,
    pub max_payload_bytes: usize,
}

impl AppState {
    pub fn new(pipeline: Arc<IngestionPipeline>, max_payload_bytes: usize) -> Self {
        Self {
            pipeline,
            max_payload_bytes,
        }
    }
}

/// Error type that implements IntoResponse
pub(crate) struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("Request error: {:?}", self.error);
        } else {
            info!("Request rejected ({}): {}", self.status, self.error);
        }
        (
            self.status,
            Json(json!({
                "error": self.error.to_string(),
            })),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: err.into(),
        }
    }
}

impl AppError {
    pub fn with_status(status: StatusCode, error: anyhow::Error) -> Self {
        Self { status, error }
    }
}

/// Build the HTTP router for `state`.
pub fn router(state: AppState) -> Router {
    let body_limit = state.max_payload_bytes;

    Router::new()
        .route("/post-data", post(handle_post_data))
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}

/// Entry point with an already resolved configuration
pub async fn run_with_config(config: RuntimeConfig) -> Result<()> {
    init_tracing(&config);

    info!("ECG ingestion server starting");

    let server = config.server.clone().unwrap_or_default();
    let addr = server.listen_addr;

    let pipeline = init_pipeline(&config).await?;

    let refresh_interval = Duration::from_secs(config.registry.refresh_interval_secs);
    let scheduler =
        RefreshScheduler::new(Arc::clone(pipeline.registry()), refresh_interval).spawn();

    let max_payload_bytes = config.request.max_payload_bytes;
    info!("Max payload size set to {} bytes", max_payload_bytes);

    let app = router(AppState::new(pipeline, max_payload_bytes));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind to {}", addr))?;

    info!("ECG ingestion endpoint listening on http://{}", addr);
    info!("Routes:");
    info!("  POST http://{}/post-data - ECG batch ingestion", addr);
    info!("  GET  http://{}/health    - Health check", addr);
    info!("  GET  http://{}/ready     - Readiness check", addr);
    info!("Press Ctrl+C or send SIGTERM to stop");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error");

    scheduler.shutdown().await;
    served?;

    info!("Server shutdown complete");

    Ok(())
}
