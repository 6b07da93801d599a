//! HTTP front for the identify lock

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::RpcResult;
use crate::messages::{LockRequest, LockStatus, ReleaseRequest};

use super::Lock;

/// Serves one identify lock over JSON endpoints
#[derive(Debug, Default)]
pub struct LockServer {
    lock: Lock,
}

impl LockServer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn router(&self) -> Router {
        Router::new()
            .route("/identify-lock/acquire", post(acquire))
            .route("/identify-lock/release", post(release))
            .with_state(self.lock.clone())
    }

    /// Binds the listener and serves until the returned task is aborted.
    /// Returns the bound address so callers can bind to port 0 in tests.
    pub async fn serve(&self, addr: SocketAddr) -> RpcResult<(SocketAddr, JoinHandle<()>)> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "identify lock service listening");

        let router = self.router();
        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, router).await {
                tracing::error!(%err, "identify lock service stopped");
            }
        });
        Ok((local_addr, handle))
    }
}

async fn acquire(State(lock): State<Lock>, Json(request): Json<LockRequest>) -> Json<LockStatus> {
    let duration = Duration::from_millis(request.duration_ms);
    Json(lock.acquire(duration, request.token.as_deref()))
}

async fn release(
    State(lock): State<Lock>,
    Json(request): Json<ReleaseRequest>,
) -> Json<LockStatus> {
    Json(lock.release(request.token.as_deref()))
}
