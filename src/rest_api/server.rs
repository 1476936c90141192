//! Axum HTTP servers for the status page and Prometheus metrics

use std::future::Future;
use std::net::SocketAddr;

use axum::{routing::get, Router};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::controller::GateStateStore;
use crate::{Error, Result};

use super::handlers;

/// Metrics endpoint handler
#[cfg(feature = "metrics")]
async fn metrics_handler() -> String {
    crate::controller::metrics::encode_registry()
}

/// Routes for the status page and gate API
pub fn status_router(store: GateStateStore) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/api/v1/gates", get(handlers::list_gates))
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

/// Routes for the Prometheus scrape endpoint
#[cfg(feature = "metrics")]
pub fn metrics_router() -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
}

async fn serve(
    name: &str,
    addr: SocketAddr,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::ConfigError(format!("Failed to bind to {}: {}", addr, e)))?;

    info!("{} server listening on {}", name, addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::ConfigError(format!("Server error: {}", e)))?;
    info!("{} server stopped", name);
    Ok(())
}

/// Serve the status page until `token` is cancelled
pub async fn run_status_server(
    addr: SocketAddr,
    store: GateStateStore,
    token: CancellationToken,
) -> Result<()> {
    serve("Status", addr, status_router(store), async move {
        token.cancelled().await
    })
    .await
}

/// Serve `/metrics` until `token` is cancelled
#[cfg(feature = "metrics")]
pub async fn run_metrics_server(addr: SocketAddr, token: CancellationToken) -> Result<()> {
    serve("Metrics", addr, metrics_router(), async move {
        token.cancelled().await
    })
    .await
}
