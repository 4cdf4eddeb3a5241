//! Workspace umbrella crate for imgmatch.
//!
//! This crate stitches the embedding store and the similarity ranker together
//! so callers can load a reference set from a configured source and rank query
//! embeddings against it with a single API entry point.

pub mod config;

pub use config::{ConfigLoadError, ImgmatchConfig, StoreSource, StoreYamlConfig};
pub use ranker::{
    cosine_similarity, rank, rank_with, set_rank_metrics, QueryVector, RankConfig, RankError,
    RankMetrics, RankedResult,
};
#[cfg(feature = "remote")]
pub use store::{DocumentStoreClient, DocumentStoreConfig};
pub use store::{
    load_json_file, normalize_documents, EmbeddingRecord, EmbeddingStore, IngestConfig,
    IngestReport, RawDocument, SnapshotStore, StaticStore, StoreError,
};

use thiserror::Error;

/// Errors that can occur while loading a store or answering a query.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("store failure: {0}")]
    Store(#[from] StoreError),

    #[error("ranking failure: {0}")]
    Rank(#[from] RankError),

    #[error("configuration failure: {0}")]
    Config(#[from] ConfigLoadError),
}

/// Loads the reference set from one configured source.
///
/// Built once at startup and reused for every refresh, so a remote client is
/// created a single time and shared by all reloads.
#[derive(Debug, Clone)]
pub struct StoreLoader {
    source: LoaderSource,
    ingest: IngestConfig,
}

#[derive(Debug, Clone)]
enum LoaderSource {
    Reference,
    Inline(Vec<RawDocument>),
    File(std::path::PathBuf),
    #[cfg(feature = "remote")]
    DocumentStore(DocumentStoreClient),
}

impl StoreLoader {
    pub fn new(cfg: &StoreYamlConfig) -> Result<Self, PipelineError> {
        let source = match cfg.source()? {
            StoreSource::Reference => LoaderSource::Reference,
            StoreSource::Inline(docs) => LoaderSource::Inline(docs),
            StoreSource::File(path) => LoaderSource::File(path),
            #[cfg(feature = "remote")]
            StoreSource::DocumentStore(remote) => {
                LoaderSource::DocumentStore(DocumentStoreClient::new(remote)?)
            }
        };
        Ok(Self {
            source,
            ingest: cfg.ingest_config(),
        })
    }

    /// Short name of the source, for logs and status endpoints.
    pub fn source_kind(&self) -> &'static str {
        match &self.source {
            LoaderSource::Reference => "reference",
            LoaderSource::Inline(_) => "inline",
            LoaderSource::File(_) => "file",
            #[cfg(feature = "remote")]
            LoaderSource::DocumentStore(_) => "document_store",
        }
    }

    /// Read and normalize the source into a fresh store.
    pub async fn load(&self) -> Result<IngestReport, PipelineError> {
        let report = match &self.source {
            LoaderSource::Reference => {
                let store = StaticStore::reference();
                IngestReport {
                    accepted: store.len(),
                    skipped: 0,
                    store,
                }
            }
            LoaderSource::Inline(docs) => normalize_documents(docs.clone(), &self.ingest)?,
            LoaderSource::File(path) => load_json_file(path, &self.ingest)?,
            #[cfg(feature = "remote")]
            LoaderSource::DocumentStore(client) => client.load(&self.ingest).await?,
        };

        tracing::info!(
            source = self.source_kind(),
            accepted = report.accepted,
            skipped = report.skipped,
            dimension = ?report.store.dimension(),
            "reference set loaded"
        );
        Ok(report)
    }
}

/// Load the reference set described by `cfg` once.
pub async fn load_store(cfg: &StoreYamlConfig) -> Result<IngestReport, PipelineError> {
    StoreLoader::new(cfg)?.load().await
}

/// Validate a raw query embedding and rank `store` against it.
///
/// # Example
/// ```
/// use imgmatch::{find_similar, RankConfig, StaticStore};
///
/// let store = StaticStore::reference();
/// let hits = find_similar(vec![0.1, 0.2, 0.3], &store, &RankConfig::default()).unwrap();
/// assert_eq!(hits[0].id, "image1");
/// ```
pub fn find_similar<S>(
    embedding: Vec<f64>,
    store: &S,
    cfg: &RankConfig,
) -> Result<Vec<RankedResult>, PipelineError>
where
    S: EmbeddingStore + ?Sized,
{
    let query = QueryVector::new(embedding)?;
    Ok(rank_with(&query, store, cfg)?)
}

/// Rank the query `[0.1, 0.2, 0.3]` against the built-in reference set.
pub fn reference_demo() -> Result<Vec<RankedResult>, PipelineError> {
    find_similar(
        vec![0.1, 0.2, 0.3],
        &StaticStore::reference(),
        &RankConfig::default(),
    )
}
