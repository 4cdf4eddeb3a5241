use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use imgmatch::{find_similar, EmbeddingStore, RankedResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Similar-images request
#[derive(Debug, Deserialize)]
pub struct SimilarImagesRequest {
    /// Query embedding, same dimensionality as the reference set
    pub embedding: Vec<f64>,
}

/// Similar-images response
#[derive(Debug, Serialize, Deserialize)]
pub struct SimilarImagesResponse {
    pub similar_images: Vec<RankedResult>,
}

/// Rank the reference set against a query embedding.
///
/// A body that is not JSON, lacks `embedding`, or carries anything other than
/// a non-empty array of numbers is rejected as `MALFORMED_QUERY` before any
/// scoring happens.
pub async fn similar_images(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<SimilarImagesRequest>, JsonRejection>,
) -> ServerResult<Json<SimilarImagesResponse>> {
    let Json(request) = payload.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::PayloadTooLarge(state.config.max_body_size_mb)
        } else {
            ServerError::MalformedQuery(rejection.body_text())
        }
    })?;

    // Pin one snapshot for the whole call
    let snapshot = state.store.snapshot();
    let similar_images = find_similar(request.embedding, snapshot.as_ref(), &state.rank_config)?;

    tracing::debug!(
        candidates = snapshot.len(),
        returned = similar_images.len(),
        "similar images ranked"
    );

    Ok(Json(SimilarImagesResponse { similar_images }))
}
