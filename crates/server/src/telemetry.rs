//! Logging and Prometheus wiring for the server binary.

use imgmatch::{set_rank_metrics, RankError, RankMetrics};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Duration;

/// Install the JSON tracing subscriber. `log` records from the store crate
/// are forwarded through the same subscriber.
pub fn init_tracing(log_level: &str) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .json()
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

/// Install the global Prometheus recorder and route ranker events into it.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    set_rank_metrics(Some(Arc::new(PrometheusRankMetrics)));
    Ok(handle)
}

/// Forwards ranking calls to the `metrics` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusRankMetrics;

impl RankMetrics for PrometheusRankMetrics {
    fn record_rank(&self, latency: Duration, candidates: usize, outcome: Result<usize, &RankError>) {
        let outcome = match outcome {
            Ok(_) => "ok",
            Err(err) if err.is_client_error() => "rejected",
            Err(_) => "error",
        };
        metrics::counter!("imgmatch_rank_requests_total", "outcome" => outcome).increment(1);
        metrics::histogram!("imgmatch_rank_latency_seconds").record(latency.as_secs_f64());
        metrics::gauge!("imgmatch_rank_candidates").set(candidates as f64);
    }
}
