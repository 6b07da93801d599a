//! HTTP front for the shared rate limit cache

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use reqwest::Method;
use tokio::task::JoinHandle;
use tracing::info;

use tether_rest::{RateLimitCache, RoutePath};

use crate::error::RpcResult;
use crate::messages::{AuthorizeRequest, AuthorizeResponse, RateLimitUpdate};

/// Serves authorization checks and header reports over the cache it owns
#[derive(Debug, Default)]
pub struct RateLimitServer {
    cache: Arc<RateLimitCache>,
}

impl RateLimitServer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<RateLimitCache> {
        &self.cache
    }

    #[must_use]
    pub fn router(&self) -> Router {
        Router::new()
            .route("/rate-limit/authorize", post(authorize))
            .route("/rate-limit/update", post(update))
            .with_state(Arc::clone(&self.cache))
    }

    pub async fn serve(&self, addr: SocketAddr) -> RpcResult<(SocketAddr, JoinHandle<()>)> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "rate limit service listening");

        let router = self.router();
        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, router).await {
                tracing::error!(%err, "rate limit service stopped");
            }
        });
        Ok((local_addr, handle))
    }
}

fn parse_route(method: &str, url: &str) -> Result<RoutePath, StatusCode> {
    let method = method
        .parse::<Method>()
        .map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok(RoutePath::new(&method, url))
}

async fn authorize(
    State(cache): State<Arc<RateLimitCache>>,
    Json(request): Json<AuthorizeRequest>,
) -> Result<Json<AuthorizeResponse>, StatusCode> {
    let route = parse_route(&request.method, &request.url)?;
    let wait = cache.authorize(&route);
    Ok(Json(AuthorizeResponse {
        reset_after_ms: u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
    }))
}

async fn update(
    State(cache): State<Arc<RateLimitCache>>,
    Json(report): Json<RateLimitUpdate>,
) -> Result<StatusCode, StatusCode> {
    let route = parse_route(&report.method, &report.url)?;
    cache.update(&route, report.headers().as_ref());
    Ok(StatusCode::NO_CONTENT)
}
