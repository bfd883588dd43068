//! Collector service receiving telemetry from the tracker.
//!
//! - `POST /api/update-pose/` stores the latest pose
//! - `GET /api/get-pose/` returns it

mod ingest;
mod routes;
mod store;

use std::future::Future;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

pub use ingest::{decode, Ingest, IncomingPose, IngestError};
pub use routes::{create_router, GET_PATH, UPDATE_PATH};
pub use store::{CollectedPose, ExtremityPoint, PoseStore};

const LOG_TARGET: &str = "pose_relay::collector";

/// Default listen address.
pub const DEFAULT_BIND: &str = "127.0.0.1:8000";

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("invalid bind address '{0}'")]
    InvalidBind(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("collector server failed: {0}")]
    Serve(#[source] std::io::Error),
}

/// Serve the collector on an already bound listener until `shutdown`
/// completes.
pub async fn serve_on<F>(
    listener: TcpListener,
    store: PoseStore,
    shutdown: F,
) -> Result<(), CollectorError>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        log::info!("Collector listening on http://{}", addr);
    }
    axum::serve(listener, create_router(store))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(CollectorError::Serve)
}

/// Bind `bind` and serve until Ctrl+C.
pub async fn serve(bind: &str) -> Result<(), CollectorError> {
    let addr: SocketAddr = bind
        .parse()
        .map_err(|_| CollectorError::InvalidBind(bind.to_string()))?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| CollectorError::Bind { addr, source })?;

    serve_on(listener, PoseStore::new(), async {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Received Ctrl+C, shutting down collector...");
        }
    })
    .await
}
