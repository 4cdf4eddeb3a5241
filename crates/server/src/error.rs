use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use imgmatch::{ConfigLoadError, PipelineError, RankError, StoreError};
use serde::{Deserialize, Serialize};

pub type ServerResult<T> = Result<T, ServerError>;

/// Server error types
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Malformed query: {0}")]
    MalformedQuery(String),

    #[error("Dimension mismatch: query has {actual} components, store expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Request timeout")]
    Timeout,

    #[error("Payload too large: max {0}MB allowed")]
    PayloadTooLarge(usize),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Rank error: {0}")]
    Rank(RankError),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found")]
    NotFound,
}

/// API error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ServerError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::MalformedQuery(_) => StatusCode::BAD_REQUEST,
            ServerError::DimensionMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::Timeout => StatusCode::REQUEST_TIMEOUT,
            ServerError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::NotFound => StatusCode::NOT_FOUND,
            ServerError::Store(_)
            | ServerError::Rank(_)
            | ServerError::Internal(_)
            | ServerError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            ServerError::MalformedQuery(_) => "MALFORMED_QUERY",
            ServerError::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            ServerError::Timeout => "REQUEST_TIMEOUT",
            ServerError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ServerError::Store(_) => "STORE_ERROR",
            ServerError::Rank(RankError::InconsistentStore { .. }) => "INCONSISTENT_STORE",
            ServerError::Rank(_) => "RANK_ERROR",
            ServerError::Internal(_) => "INTERNAL_ERROR",
            ServerError::Config(_) => "CONFIG_ERROR",
            ServerError::NotFound => "NOT_FOUND",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "request failed");
        }

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
            },
        });

        (status, body).into_response()
    }
}

impl From<RankError> for ServerError {
    fn from(err: RankError) -> Self {
        match err {
            RankError::MalformedQuery(msg) => ServerError::MalformedQuery(msg),
            RankError::DimensionMismatch { expected, actual } => {
                ServerError::DimensionMismatch { expected, actual }
            }
            other => ServerError::Rank(other),
        }
    }
}

impl From<PipelineError> for ServerError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Rank(e) => e.into(),
            PipelineError::Store(e) => ServerError::Store(e),
            PipelineError::Config(e) => e.into(),
        }
    }
}

impl From<ConfigLoadError> for ServerError {
    fn from(err: ConfigLoadError) -> Self {
        ServerError::Config(err.to_string())
    }
}

impl From<std::net::AddrParseError> for ServerError {
    fn from(err: std::net::AddrParseError) -> Self {
        ServerError::Config(format!("Invalid address: {err}"))
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(err: anyhow::Error) -> Self {
        ServerError::Internal(err.to_string())
    }
}
