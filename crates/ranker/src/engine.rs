use std::cmp::Ordering;
use std::time::Instant;

use store::{EmbeddingRecord, EmbeddingStore};

use crate::metrics::metrics_recorder;
use crate::types::{max_abs, QueryVector, RankConfig, RankError, RankedResult};


/// Cosine similarity between two vectors.
///
/// Returns `0.0` when the lengths differ, either vector is empty or has zero
/// magnitude. Both sides are scaled by their largest absolute component before
/// the dot product, so very small or very large finite magnitudes still score
/// by direction. The value is clamped to `[-1.0, 1.0]` to absorb rounding.
#[inline]
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (scale_a, scale_b) = (max_abs(a), max_abs(b));
    if !usable_scale(scale_a) || !usable_scale(scale_b) {
        return 0.0;
    }
    let (dot, norm_a, norm_b) = scaled_dot_and_norms(a, scale_a, b, scale_b);
    finish(dot, norm_a.sqrt(), norm_b.sqrt())
}

#[inline(always)]
fn usable_scale(scale: f64) -> bool {
    scale > 0.0 && scale.is_finite()
}

#[inline(always)]
fn scaled_dot_and_norms(a: &[f64], scale_a: f64, b: &[f64], scale_b: f64) -> (f64, f64, f64) {
    a.iter()
        .zip(b)
        .fold((0.0, 0.0, 0.0), |(dot, na, nb), (&x, &y)| {
            let (x, y) = (x / scale_a, y / scale_b);
            (dot + x * y, na + x * x, nb + y * y)
        })
}

#[inline(always)]
fn finish(dot: f64, norm_a: f64, norm_b: f64) -> f64 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let similarity = dot / (norm_a * norm_b);
    if !similarity.is_finite() || similarity == 0.0 {
        // also folds -0.0 into 0.0
        return 0.0;
    }
    similarity.clamp(-1.0, 1.0)
}

/// Similarity of a validated query against one candidate, reusing the query's
/// scale and scaled norm.
#[inline]
fn score(query: &QueryVector, candidate: &[f64]) -> f64 {
    let scale_q = query.scale();
    let scale_c = max_abs(candidate);
    if !usable_scale(scale_q) || !usable_scale(scale_c) {
        return 0.0;
    }
    let (dot, norm_c) = query
        .as_slice()
        .iter()
        .zip(candidate)
        .fold((0.0, 0.0), |(dot, nc), (&q, &c)| {
            let (q, c) = (q / scale_q, c / scale_c);
            (dot + q * c, nc + c * c)
        });
    finish(dot, query.scaled_norm(), norm_c.sqrt())
}

#[cfg(not(feature = "parallel"))]
fn score_all(query: &QueryVector, records: &[EmbeddingRecord]) -> Vec<f64> {
    records.iter().map(|r| score(query, &r.vector)).collect()
}

#[cfg(feature = "parallel")]
fn score_all(query: &QueryVector, records: &[EmbeddingRecord]) -> Vec<f64> {
    use rayon::prelude::*;
    // indexed collect keeps store order
    records.par_iter().map(|r| score(query, &r.vector)).collect()
}

/// Reject the call unless the query and every record share one dimension.
fn check_dimensions(query: &QueryVector, records: &[EmbeddingRecord]) -> Result<(), RankError> {
    let Some(first) = records.first() else {
        return Ok(());
    };
    let expected = first.dimension();
    if let Some(bad) = records.iter().find(|r| r.dimension() != expected) {
        return Err(RankError::InconsistentStore {
            id: bad.id.clone(),
            expected,
            actual: bad.dimension(),
        });
    }
    if query.dimension() != expected {
        return Err(RankError::DimensionMismatch {
            expected,
            actual: query.dimension(),
        });
    }
    Ok(())
}

fn rank_records(
    query: &QueryVector,
    records: &[EmbeddingRecord],
    k: usize,
    floor: Option<f64>,
) -> Result<Vec<RankedResult>, RankError> {
    if records.is_empty() {
        return Ok(Vec::new());
    }
    check_dimensions(query, records)?;
    if k == 0 {
        return Ok(Vec::new());
    }

    let mut scored: Vec<(usize, f64)> = score_all(query, records)
        .into_iter()
        .enumerate()
        .collect();
    // `sort_by` is stable: equal scores keep store order.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    Ok(scored
        .into_iter()
        .filter(|&(_, similarity)| floor.map_or(true, |min| similarity >= min))
        .take(k)
        .map(|(idx, similarity)| RankedResult {
            id: records[idx].id.clone(),
            similarity,
        })
        .collect())
}

fn observed<F>(records: &[EmbeddingRecord], run: F) -> Result<Vec<RankedResult>, RankError>
where
    F: FnOnce(&[EmbeddingRecord]) -> Result<Vec<RankedResult>, RankError>,
{
    let start = Instant::now();
    let outcome = run(records);
    let latency = start.elapsed();

    match &outcome {
        Ok(results) => tracing::debug!(
            candidates = records.len(),
            returned = results.len(),
            latency_us = latency.as_micros() as u64,
            "ranked query"
        ),
        Err(err) => tracing::debug!(
            candidates = records.len(),
            error = %err,
            "rejected query"
        ),
    }

    if let Some(recorder) = metrics_recorder() {
        recorder.record_rank(
            latency,
            records.len(),
            outcome.as_ref().map(Vec::len),
        );
    }
    outcome
}

/// Rank the store against `query` and return the `k` most similar records,
/// highest similarity first.
///
/// The store is read once, so the whole call sees a single snapshot. An empty
/// store yields no results. Otherwise the query and every record must share
/// one dimension; that is checked before any score is computed. `k == 0`
/// yields no results.
///
/// # Example
/// ```
/// use ranker::{rank, QueryVector};
/// use store::StaticStore;
///
/// let store = StaticStore::reference();
/// let query = QueryVector::new(vec![0.1, 0.2, 0.3]).unwrap();
/// let hits = rank(&query, &store, 3).unwrap();
///
/// assert_eq!(hits.len(), 3);
/// assert_eq!(hits[0].id, "image1");
/// assert!((hits[0].similarity - 1.0).abs() < 1e-12);
/// ```
pub fn rank<S>(query: &QueryVector, store: &S, k: usize) -> Result<Vec<RankedResult>, RankError>
where
    S: EmbeddingStore + ?Sized,
{
    let records = store.all();
    observed(&records, |records| rank_records(query, records, k, None))
}

/// Like [`rank`], driven by a [`RankConfig`]. Results scoring below
/// `min_similarity` are dropped before truncating to `top_k`.
pub fn rank_with<S>(
    query: &QueryVector,
    store: &S,
    cfg: &RankConfig,
) -> Result<Vec<RankedResult>, RankError>
where
    S: EmbeddingStore + ?Sized,
{
    let records = store.all();
    observed(&records, |records| {
        cfg.validate()?;
        rank_records(query, records, cfg.top_k, cfg.min_similarity)
    })
}
