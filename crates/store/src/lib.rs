//! # imgmatch Store
//!
//! This crate holds the reference set of embeddings that queries are ranked
//! against. It keeps the collection in memory, behind a single read interface,
//! so the ranker never needs to know where the vectors came from.
//!
//! ## Core Features
//!
//! - **Read Interface**: every store implements [`EmbeddingStore`], whose
//!   [`EmbeddingStore::all`] returns the whole collection in a stable order.
//! - **Validated Collections**: [`StaticStore`] rejects empty or duplicate ids,
//!   empty or non-finite vectors and mixed dimensionality at construction, so a
//!   store that exists is a store whose records share one dimension `D`.
//! - **Atomic Refresh**: [`SnapshotStore`] swaps whole collections. A reader
//!   that already took a snapshot keeps seeing it in full while a refresh
//!   publishes the next one.
//! - **Ingestion**: the [`ingest`] module normalizes raw documents (from a JSON
//!   file, or from a remote document store with the `remote` feature) into a
//!   [`StaticStore`].
//!
//! ## Example Usage
//!
//! ```
//! use store::{EmbeddingRecord, EmbeddingStore, SnapshotStore, StaticStore};
//!
//! let records = vec![
//!     EmbeddingRecord::new("image1", vec![0.1, 0.2, 0.3]),
//!     EmbeddingRecord::new("image2", vec![0.4, 0.5, 0.6]),
//! ];
//! let store = SnapshotStore::new(StaticStore::new(records).unwrap());
//! assert_eq!(store.len(), 2);
//! assert_eq!(store.dimension(), Some(3));
//!
//! // A refresh replaces the whole collection in one step.
//! store.publish(StaticStore::empty());
//! assert!(store.is_empty());
//! ```

mod backend;
pub mod ingest;
#[cfg(feature = "remote")]
pub mod remote;

pub use backend::{EmbeddingStore, SnapshotStore, StaticStore};
pub use ingest::{load_json_file, normalize_documents, IngestConfig, IngestReport, RawDocument};
#[cfg(feature = "remote")]
pub use remote::{DocumentStoreClient, DocumentStoreConfig};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single reference item: a stable identifier plus its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Unique, non-empty identifier of the item.
    pub id: String,
    /// Embedding vector. Every record in a store shares the same length.
    pub vector: Vec<f64>,
}

impl EmbeddingRecord {
    pub fn new(id: impl Into<String>, vector: Vec<f64>) -> Self {
        Self {
            id: id.into(),
            vector,
        }
    }

    /// Length of the embedding vector.
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// Errors raised while building or loading a store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record id must not be empty")]
    EmptyId,

    #[error("duplicate record id '{0}'")]
    DuplicateId(String),

    #[error("record '{0}' has an empty embedding")]
    EmptyVector(String),

    #[error("record '{id}' has a non-finite component at index {index}")]
    NonFiniteComponent { id: String, index: usize },

    #[error("record '{id}' has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        id: String,
        expected: usize,
        actual: usize,
    },

    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "remote")]
    #[error("document store request failed: {0}")]
    Remote(String),
}

impl StoreError {
    /// Whether the error concerns one bad document rather than the source as a whole.
    ///
    /// Lenient ingestion skips record-level failures and keeps going.
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            StoreError::EmptyId
                | StoreError::DuplicateId(_)
                | StoreError::EmptyVector(_)
                | StoreError::NonFiniteComponent { .. }
                | StoreError::DimensionMismatch { .. }
                | StoreError::MalformedDocument(_)
        )
    }
}
