use crate::error::ServerResult;
use crate::state::ServerState;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::Json;
use imgmatch::EmbeddingStore;
use serde_json::json;
use std::sync::Arc;
use std::time::SystemTime;

/// Global server start time for uptime calculation
static SERVER_START_TIME: once_cell::sync::Lazy<SystemTime> =
    once_cell::sync::Lazy::new(SystemTime::now);

fn uptime_seconds() -> u64 {
    SERVER_START_TIME
        .elapsed()
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Health check endpoint (liveness)
/// Returns 200 if server is running
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "imgmatch-server",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds(),
    }))
}

/// Readiness check endpoint
///
/// The store is loaded before the listener binds, so a running server is
/// always ready. An empty reference set is reported, not treated as a fault.
pub async fn readiness_check(
    State(state): State<Arc<ServerState>>,
) -> ServerResult<impl IntoResponse> {
    let snapshot = state.store.snapshot();
    let status = state.status();

    Ok(Json(json!({
        "status": "ready",
        "service": "imgmatch-server",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds(),
        "store": {
            "source": state.source_kind(),
            "records": snapshot.len(),
            "dimension": snapshot.dimension(),
            "loaded_at": status.loaded_at.to_rfc3339(),
        }
    })))
}

/// Metrics endpoint
///
/// Prometheus text exposition when a recorder is installed, JSON uptime otherwise.
pub async fn metrics(State(state): State<Arc<ServerState>>) -> Response {
    match (&state.metrics, state.config.metrics_enabled) {
        (Some(handle), true) => (
            [(CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        _ => Json(json!({
            "uptime_seconds": uptime_seconds(),
            "records": state.store.len(),
        }))
        .into_response(),
    }
}
