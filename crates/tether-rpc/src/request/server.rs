//! HTTP front for the central request executor

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use reqwest::Method;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use tether_rest::{Api, ApiRequest};

use crate::error::RpcResult;
use crate::messages::{RemoteRequest, RemoteResponse};

/// Relays requests through the REST pipeline this server owns.
///
/// The wrapped client's queue must be started by the caller; relayed
/// requests that hit rate limits park there like local ones.
#[derive(Debug)]
pub struct RequestServer {
    api: Arc<Api>,
}

impl RequestServer {
    #[must_use]
    pub fn new(api: Arc<Api>) -> Self {
        Self { api }
    }

    #[must_use]
    pub fn router(&self) -> Router {
        Router::new()
            .route("/request/execute", post(execute))
            .with_state(Arc::clone(&self.api))
    }

    pub async fn serve(&self, addr: SocketAddr) -> RpcResult<(SocketAddr, JoinHandle<()>)> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "request service listening");

        let router = self.router();
        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, router).await {
                tracing::error!(%err, "request service stopped");
            }
        });
        Ok((local_addr, handle))
    }
}

async fn execute(
    State(api): State<Arc<Api>>,
    Json(request): Json<RemoteRequest>,
) -> Result<Json<RemoteResponse>, StatusCode> {
    let method = request
        .method
        .parse::<Method>()
        .map_err(|_| StatusCode::BAD_REQUEST)?;
    // executes on this process even if the serving Api gains a delegate
    let api_request = ApiRequest::new(method, &request.url, request.body).local();

    match api.request(api_request).await {
        Ok(response) => Ok(Json(response.into())),
        Err(err) => {
            warn!(%err, url = %request.url, "relayed request failed");
            Err(StatusCode::BAD_GATEWAY)
        }
    }
}
