use crate::error::ServerResult;
use crate::state::{ReloadSummary, ServerState};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use imgmatch::EmbeddingStore;
use serde_json::json;
use std::sync::Arc;

/// Record count and dimensionality of the live snapshot
pub async fn store_stats(
    State(state): State<Arc<ServerState>>,
) -> ServerResult<impl IntoResponse> {
    let snapshot = state.store.snapshot();
    let status = state.status();

    Ok(Json(json!({
        "source": state.source_kind(),
        "records": snapshot.len(),
        "dimension": snapshot.dimension(),
        "loaded_at": status.loaded_at.to_rfc3339(),
        "reloads": status.reloads,
        "last_skipped": status.last_skipped,
        "top_k": state.rank_config.top_k,
    })))
}

/// Reload the reference set from its source and publish it
pub async fn reload_store(
    State(state): State<Arc<ServerState>>,
) -> ServerResult<Json<ReloadSummary>> {
    let summary = state.reload().await?;

    tracing::info!(
        source = summary.source,
        accepted = summary.accepted,
        skipped = summary.skipped,
        previous = summary.previous_records,
        "reference set reloaded on request"
    );

    Ok(Json(summary))
}
