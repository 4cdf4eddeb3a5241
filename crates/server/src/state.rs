use crate::config::ServerConfig;
use crate::error::ServerResult;
use chrono::{DateTime, Utc};
use imgmatch::{EmbeddingStore, ImgmatchConfig, RankConfig, SnapshotStore, StaticStore, StoreLoader};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::{Arc, RwLock};

/// Shared application state
pub struct ServerState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Pipeline configuration (store source + ranking policy)
    pub pipeline: Arc<ImgmatchConfig>,

    /// Ranking policy applied to every query
    pub rank_config: RankConfig,

    /// Current reference set, swapped atomically on reload
    pub store: Arc<SnapshotStore>,

    /// Prometheus handle when a recorder is installed
    pub metrics: Option<PrometheusHandle>,

    loader: StoreLoader,
    status: RwLock<StoreStatus>,
    reload_lock: tokio::sync::Mutex<()>,
}

/// Bookkeeping about the live snapshot
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub loaded_at: DateTime<Utc>,
    pub reloads: u64,
    pub last_skipped: usize,
}

/// Outcome of one reload
#[derive(Debug, Clone, Serialize)]
pub struct ReloadSummary {
    pub source: &'static str,
    pub accepted: usize,
    pub skipped: usize,
    pub previous_records: usize,
    pub dimension: Option<usize>,
}

impl ServerState {
    /// Build state by loading the reference set from the configured source.
    pub async fn load(config: ServerConfig) -> ServerResult<Self> {
        let pipeline = config.pipeline()?;
        let loader = StoreLoader::new(&pipeline.store)?;
        let report = loader.load().await?;
        let skipped = report.skipped;

        let mut state = Self::assemble(config, pipeline, loader, report.store);
        state.status_mut().last_skipped = skipped;
        Ok(state)
    }

    /// Build state around an already-populated store.
    pub fn with_store(
        config: ServerConfig,
        pipeline: ImgmatchConfig,
        store: StaticStore,
    ) -> ServerResult<Self> {
        let loader = StoreLoader::new(&pipeline.store)?;
        Ok(Self::assemble(config, pipeline, loader, store))
    }

    fn assemble(
        config: ServerConfig,
        pipeline: ImgmatchConfig,
        loader: StoreLoader,
        store: StaticStore,
    ) -> Self {
        metrics::gauge!("imgmatch_store_records").set(store.len() as f64);
        Self {
            config: Arc::new(config),
            rank_config: pipeline.ranker.clone(),
            pipeline: Arc::new(pipeline),
            store: Arc::new(SnapshotStore::new(store)),
            metrics: None,
            loader,
            status: RwLock::new(StoreStatus {
                loaded_at: Utc::now(),
                reloads: 0,
                last_skipped: 0,
            }),
            reload_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Attach the Prometheus handle used by `GET /metrics`.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Short name of the configured source.
    pub fn source_kind(&self) -> &'static str {
        self.loader.source_kind()
    }

    pub fn status(&self) -> StoreStatus {
        self.status
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn status_mut(&mut self) -> &mut StoreStatus {
        self.status
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reload the source and publish the result as the new snapshot.
    ///
    /// Reloads run one at a time. On failure the previous snapshot stays live.
    pub async fn reload(&self) -> ServerResult<ReloadSummary> {
        let _guard = self.reload_lock.lock().await;

        let report = self.loader.load().await?;
        let dimension = report.store.dimension();
        let accepted = report.accepted;
        let skipped = report.skipped;
        let previous_records = self.store.publish(report.store);

        {
            let mut status = self
                .status
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            status.loaded_at = Utc::now();
            status.reloads += 1;
            status.last_skipped = skipped;
        }

        metrics::counter!("imgmatch_store_reloads_total").increment(1);
        metrics::gauge!("imgmatch_store_records").set(accepted as f64);

        Ok(ReloadSummary {
            source: self.source_kind(),
            accepted,
            skipped,
            previous_records,
            dimension,
        })
    }
}
