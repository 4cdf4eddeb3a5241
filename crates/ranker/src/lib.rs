//! # imgmatch Ranker (`ranker`)
//!
//! ## Purpose
//!
//! `ranker` answers one question: given a query embedding, which records in an
//! [`store::EmbeddingStore`] point in the most similar direction? It scores
//! every record with cosine similarity, sorts descending and keeps the top `k`.
//! The scan is linear; reference sets are small and static.
//!
//! ## Core Types
//!
//! - [`QueryVector`]: a validated, non-empty, finite query embedding.
//! - [`RankedResult`]: record id plus similarity in `[-1.0, 1.0]`.
//! - [`RankConfig`]: `top_k` (3 by default) and an optional similarity floor.
//! - [`RankError`]: malformed query, dimension mismatch, or a store that broke
//!   its own uniform-dimension invariant.
//!
//! ## Ranking Rules
//!
//! - A zero-magnitude vector on either side scores `0.0`.
//! - Equal scores keep the store's order, so output is reproducible.
//! - An empty store, or `k == 0`, yields an empty list rather than an error.
//! - Dimension checks run before any score is computed.
//!
//! ## Example Usage
//!
//! ```
//! use ranker::{rank_with, QueryVector, RankConfig};
//! use store::{EmbeddingRecord, StaticStore};
//!
//! let store = StaticStore::new(vec![
//!     EmbeddingRecord::new("north", vec![0.0, 1.0]),
//!     EmbeddingRecord::new("east", vec![1.0, 0.0]),
//!     EmbeddingRecord::new("south", vec![0.0, -1.0]),
//! ])
//! .unwrap();
//!
//! let query = QueryVector::new(vec![0.1, 1.0]).unwrap();
//! let cfg = RankConfig { top_k: 3, min_similarity: Some(0.0) };
//! let hits = rank_with(&query, &store, &cfg).unwrap();
//!
//! assert_eq!(hits.len(), 2);
//! assert_eq!(hits[0].id, "north");
//! ```
//!
//! ## Observability
//!
//! Install a [`RankMetrics`] implementation via [`set_rank_metrics`] to record
//! per-call latency, candidate counts and outcomes.

pub mod engine;
pub mod metrics;
pub mod types;

pub use crate::engine::{cosine_similarity, rank, rank_with};
pub use crate::metrics::{set_rank_metrics, RankMetrics};
pub use crate::types::{QueryVector, RankConfig, RankError, RankedResult};
