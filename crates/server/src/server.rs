//! Server initialization and routing
//!
//! This module handles the Axum server setup including:
//! - Router configuration with all API endpoints
//! - Middleware stack (request IDs, logging, timeouts, compression, CORS)
//! - Background refresh of the reference set
//! - Graceful shutdown handling

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::middleware::{log_requests, request_id};
use crate::routes::{api_info, not_found};
use crate::routes::{health, similar, store};
use crate::state::ServerState;
use crate::telemetry;
use axum::error_handling::HandleErrorLayer;
use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::{BoxError, Router};
use imgmatch::EmbeddingStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the Axum router with all routes and middleware
///
/// Middleware stack, outermost first:
/// 1. Request ID tracking
/// 2. Request logging
/// 3. Trace spans
/// 4. CORS
/// 5. Compression
/// 6. Timeout handling
/// 7. Body size limit
pub fn build_router(state: Arc<ServerState>) -> Router {
    let cors = if state.config.enable_cors {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    let timeout = state.config.timeout();

    let routes = Router::new()
        .route("/", get(api_info))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics))
        .route("/api/similar-images", post(similar::similar_images))
        .route("/api/v1/store/stats", get(store::store_stats))
        .route("/api/v1/store/reload", post(store::reload_store))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(state.config.max_body_size()));

    with_timeout(routes, timeout)
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(log_requests))
        .layer(from_fn(request_id))
        .with_state(state)
}

/// Abort handlers that run past `timeout`, answering with a JSON 408.
fn with_timeout<S>(router: Router<S>, timeout: Duration) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(handle_middleware_error))
            .timeout(timeout),
    )
}

async fn handle_middleware_error(err: BoxError) -> ServerError {
    if err.is::<tower::timeout::error::Elapsed>() {
        ServerError::Timeout
    } else {
        ServerError::Internal(format!("unhandled middleware error: {err}"))
    }
}

/// Start the imgmatch HTTP server
///
/// Loads the reference set, then serves until SIGTERM or Ctrl+C.
///
/// # Example
///
/// ```rust,no_run
/// use server::ServerConfig;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = ServerConfig::load()?;
///     server::start_server(config).await?;
///     Ok(())
/// }
/// ```
///
/// # Initialization
///
/// 1. Sets up structured JSON logging with the configured log level
/// 2. Installs the Prometheus recorder when metrics are enabled
/// 3. Loads the reference set from the pipeline config
/// 4. Spawns the refresh task if `store.refresh_interval_secs` is non-zero
/// 5. Binds and serves with graceful shutdown
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    telemetry::init_tracing(&config.log_level)?;

    let metrics_handle = if config.metrics_enabled {
        Some(telemetry::init_metrics()?)
    } else {
        None
    };

    let addr: SocketAddr = config.socket_addr()?;

    let mut state = ServerState::load(config.clone()).await?;
    if let Some(handle) = metrics_handle {
        state = state.with_metrics(handle);
    }
    let state = Arc::new(state);

    tracing::info!(
        source = state.source_kind(),
        records = state.store.len(),
        dimension = ?state.store.dimension(),
        top_k = state.rank_config.top_k,
        "reference set ready"
    );
    tracing::info!(
        "Timeout: {}s, Max body: {}MB, CORS: {}, Metrics: {}",
        config.timeout_secs,
        config.max_body_size_mb,
        config.enable_cors,
        config.metrics_enabled
    );

    let refresh = match state.pipeline.store.refresh_interval_secs {
        0 => None,
        secs => Some(spawn_refresh(state.clone(), Duration::from_secs(secs))),
    };

    let app = build_router(state);

    tracing::info!("Starting imgmatch server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(task) = refresh {
        task.abort();
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Reload the reference set every `every`, keeping the old snapshot on failure.
pub fn spawn_refresh(state: Arc<ServerState>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately and the store is already fresh.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match state.reload().await {
                Ok(summary) => tracing::info!(
                    source = summary.source,
                    accepted = summary.accepted,
                    skipped = summary.skipped,
                    "reference set refreshed"
                ),
                Err(err) => tracing::warn!(
                    error = %err,
                    "reference set refresh failed, keeping previous snapshot"
                ),
            }
        }
    })
}

/// Shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
