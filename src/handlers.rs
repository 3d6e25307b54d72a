// HTTP request handlers for server mode
//
// Implements ECG batch ingestion and health check endpoints

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ecgingest_core::IngestPayload;
use ecgingest_handlers::IngestOutcome;
use metrics::{counter, histogram};
use serde_json::json;
use std::time::Instant;
use tracing::debug;

use crate::{AppError, AppState};

/// POST /post-data - ECG batch ingestion endpoint
///
/// Bodies over the configured limit never get here; the router answers 413.
pub(crate) async fn handle_post_data(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, AppError> {
    let start = Instant::now();
    debug!("Received ECG batch ({} bytes)", body.len());

    let payload: IngestPayload = serde_json::from_slice(&body).map_err(|e| {
        counter!("ecg.ingest.rejected", 1);
        AppError::with_status(
            StatusCode::BAD_REQUEST,
            anyhow::Error::new(e).context("Failed to parse ECG payload"),
        )
    })?;

    let batch = payload.into_batch().map_err(|e| {
        counter!("ecg.ingest.rejected", 1);
        AppError::with_status(StatusCode::BAD_REQUEST, e.into())
    })?;

    let outcome = state.pipeline.ingest(batch).await;
    histogram!(
        "ecg.ingest.latency_ms",
        start.elapsed().as_secs_f64() * 1000.0
    );

    match outcome {
        IngestOutcome::Lost { rejection, error } => Err(AppError::with_status(
            StatusCode::INTERNAL_SERVER_ERROR,
            anyhow::Error::new(error).context(format!("batch lost after {}", rejection)),
        )),
        IngestOutcome::FallenBack(rejection) if rejection.kind.status_code() != 200 => {
            let status = StatusCode::from_u16(rejection.kind.status_code())
                .unwrap_or(StatusCode::BAD_REQUEST);
            Err(AppError::with_status(status, anyhow::Error::new(rejection)))
        }
        IngestOutcome::Persisted { .. } | IngestOutcome::FallenBack(_) => Ok((
            StatusCode::OK,
            Json(json!({"message": "Data received successfully"})),
        )
            .into_response()),
    }
}

/// GET /health - Basic health check
pub(crate) async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "healthy"})))
}

/// GET /ready - Readiness check (requires one successful registry refresh)
pub(crate) async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.pipeline.registry().snapshot();

    match snapshot.refreshed_at() {
        Some(refreshed_at) => (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "registry": {
                    "devices": snapshot.len(),
                    "refreshed_at": refreshed_at.to_rfc3339(),
                },
            })),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "not ready", "registry": "never refreshed"})),
        ),
    }
}
