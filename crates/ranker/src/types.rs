use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by a ranking call. All of them are raised before any
/// similarity is computed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RankError {
    /// The query is missing, empty, or not a sequence of finite numbers.
    #[error("malformed query: {0}")]
    MalformedQuery(String),

    /// The query length differs from the store's dimensionality.
    #[error("query has dimension {actual}, store expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A stored record breaks the uniform-dimension invariant.
    #[error("stored record '{id}' has dimension {actual}, store expects {expected}")]
    InconsistentStore {
        id: String,
        expected: usize,
        actual: usize,
    },

    #[error("invalid rank config: {0}")]
    InvalidConfig(String),
}

impl RankError {
    /// Whether the caller, rather than the service, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RankError::MalformedQuery(_) | RankError::DimensionMismatch { .. }
        )
    }
}

/// A validated query embedding.
///
/// Construction rejects empty vectors and NaN or infinite components, so a
/// `QueryVector` that exists can always be scored.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryVector {
    values: Vec<f64>,
    /// Largest absolute component; zero only for the zero vector.
    scale: f64,
    /// Norm of `values / scale`, so it never underflows or overflows.
    scaled_norm: f64,
}

impl QueryVector {
    pub fn new(values: Vec<f64>) -> Result<Self, RankError> {
        if values.is_empty() {
            return Err(RankError::MalformedQuery(
                "embedding must not be empty".into(),
            ));
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(RankError::MalformedQuery(format!(
                "embedding component {index} is not a finite number"
            )));
        }
        let scale = max_abs(&values);
        let scaled_norm = if scale == 0.0 {
            0.0
        } else {
            values
                .iter()
                .map(|v| {
                    let x = v / scale;
                    x * x
                })
                .sum::<f64>()
                .sqrt()
        };
        Ok(Self {
            values,
            scale,
            scaled_norm,
        })
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Euclidean norm. Saturates to infinity for magnitudes beyond `f64`.
    pub fn norm(&self) -> f64 {
        self.scale * self.scaled_norm
    }

    pub(crate) fn scale(&self) -> f64 {
        self.scale
    }

    pub(crate) fn scaled_norm(&self) -> f64 {
        self.scaled_norm
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.values
    }
}

pub(crate) fn max_abs(values: &[f64]) -> f64 {
    values.iter().fold(0.0, |max, v| max.max(v.abs()))
}

impl TryFrom<Vec<f64>> for QueryVector {
    type Error = RankError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

/// One ranked neighbour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub id: String,
    /// Cosine similarity in `[-1.0, 1.0]`.
    pub similarity: f64,
}

/// Per-call ranking policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankConfig {
    /// Maximum number of results to return.
    #[serde(default = "RankConfig::default_top_k")]
    pub top_k: usize,
    /// Drop results scoring below this value. Applied before truncation.
    #[serde(default)]
    pub min_similarity: Option<f64>,
}

impl RankConfig {
    pub(crate) fn default_top_k() -> usize {
        3
    }

    pub fn with_top_k(top_k: usize) -> Self {
        Self {
            top_k,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), RankError> {
        if self.top_k == 0 {
            return Err(RankError::InvalidConfig(
                "top_k must be greater than zero".into(),
            ));
        }
        if let Some(floor) = self.min_similarity {
            if !(-1.0..=1.0).contains(&floor) {
                return Err(RankError::InvalidConfig(
                    "min_similarity must be between -1.0 and 1.0".into(),
                ));
            }
        }
        Ok(())
    }
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            top_k: Self::default_top_k(),
            min_similarity: None,
        }
    }
}
