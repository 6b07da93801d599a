//! Seams for delegating rate limit checks and request execution to a
//! central coordination service shared by multiple client processes

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::rate_limit::{RateLimitHeaders, RoutePath};
use crate::request::{ApiRequest, ApiResponse};

#[derive(Debug, Error)]
pub enum RemoteError {
    /// The service could not be reached. Callers with fallback enabled
    /// treat this as a signal to continue with local handling; any other
    /// error is surfaced.
    #[error("coordination service unreachable: {0}")]
    Unavailable(String),

    #[error("coordination service call failed: {0}")]
    Failed(String),
}

impl RemoteError {
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// A central authority that owns rate limit state for a group of clients
#[async_trait]
pub trait RemoteRateLimiter: Send + Sync {
    /// Asks to send a request now. `Duration::ZERO` grants it; a nonzero
    /// value is how long to wait before asking again.
    async fn authorize(&self, route: &RoutePath) -> Result<Duration, RemoteError>;

    /// Reports rate limit headers from a response so the authority can
    /// track state the client observed directly.
    async fn update(
        &self,
        route: &RoutePath,
        headers: Option<&RateLimitHeaders>,
    ) -> Result<(), RemoteError>;
}

/// A central executor that sends requests on the client's behalf,
/// applying its own rate limit handling
#[async_trait]
pub trait RemoteRequestExecutor: Send + Sync {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, RemoteError>;
}
