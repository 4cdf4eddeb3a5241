// Metrics hooks for the `ranker` crate.
//
// Callers install a global `RankMetrics` implementation via [`set_rank_metrics`];
// every call to [`crate::rank`] or [`crate::rank_with`] then reports its latency,
// candidate count and outcome. This keeps instrumentation decoupled from any
// specific metrics backend.
use std::sync::{Arc, RwLock};
use std::time::Duration;

use once_cell::sync::OnceCell;

use crate::types::RankError;

/// Metrics observer for ranking calls.
pub trait RankMetrics: Send + Sync {
    /// Record the outcome of one ranking call.
    ///
    /// `candidates` is the size of the store snapshot that was ranked and
    /// `outcome` carries either the number of results returned or the error
    /// that stopped the call.
    fn record_rank(&self, latency: Duration, candidates: usize, outcome: Result<usize, &RankError>);
}

fn metrics_lock() -> &'static RwLock<Option<Arc<dyn RankMetrics>>> {
    static METRICS: OnceCell<RwLock<Option<Arc<dyn RankMetrics>>>> = OnceCell::new();
    METRICS.get_or_init(|| RwLock::new(None))
}

pub(crate) fn metrics_recorder() -> Option<Arc<dyn RankMetrics>> {
    let guard = metrics_lock()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.clone()
}

/// Install or clear the global rank metrics recorder.
///
/// Typically called once during service startup.
pub fn set_rank_metrics(recorder: Option<Arc<dyn RankMetrics>>) {
    let mut guard = metrics_lock()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = recorder;
}
