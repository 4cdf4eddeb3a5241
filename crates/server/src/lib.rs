//! imgmatch server - HTTP REST API for similar-image lookup
//!
//! Exposes the imgmatch ranker over HTTP. A client that already holds an
//! embedding for a query image posts it and receives the closest images in
//! the reference set, ranked by cosine similarity.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load()?;
//!     server::start_server(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! # API Endpoints
//!
//! - `POST /api/similar-images` - Top-K similar images for `{"embedding": [...]}`
//! - `GET /api/v1/store/stats` - Record count and dimension of the reference set
//! - `POST /api/v1/store/reload` - Reload the reference set from its source
//! - `GET /` - API information
//! - `GET /health` - Liveness probe
//! - `GET /ready` - Readiness probe
//! - `GET /metrics` - Prometheus metrics
//!
//! # Configuration
//!
//! Settings come from an optional `server.{toml,yaml,json}` file and
//! `IMGMATCH_SERVER__*` environment variables. `pipeline_config` points at the
//! YAML file that selects the reference-set source and the ranking policy.

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;
pub mod telemetry;

pub use config::ServerConfig;
pub use error::{ErrorDetail, ErrorResponse, ServerError, ServerResult};
pub use server::{build_router, spawn_refresh, start_server};
pub use state::{ReloadSummary, ServerState, StoreStatus};
