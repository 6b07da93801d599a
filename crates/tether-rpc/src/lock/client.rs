//! Client side of one identify lock

use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{RpcError, RpcResult};
use crate::messages::{LockRequest, LockStatus, ReleaseRequest};

/// Talks to one lock service, remembering the grant token across calls
/// so a reconnecting shard refreshes its own grant instead of waiting
/// for it to expire.
#[derive(Debug)]
pub struct HttpLockClient {
    http: reqwest::Client,
    base_url: String,
    duration: Duration,
    /// Continue without this lock when the service is unreachable
    allow_fallback: bool,
    token: Mutex<Option<String>>,
}

impl HttpLockClient {
    #[must_use]
    pub fn new(base_url: &str, duration: Duration, allow_fallback: bool) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            duration,
            allow_fallback,
            token: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn allow_fallback(&self) -> bool {
        self.allow_fallback
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Asks the service for the lock. On a grant the token is stored for
    /// later refresh and release.
    pub async fn acquire(&self) -> RpcResult<LockStatus> {
        let request = LockRequest {
            duration_ms: u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX),
            token: self.token.lock().clone(),
        };

        let status = self.post("acquire", &request).await?;
        if status.success {
            *self.token.lock() = status.token.clone();
        } else {
            debug!(
                url = %self.base_url,
                message = status.message.as_deref().unwrap_or(""),
                "identify lock denied"
            );
        }
        Ok(status)
    }

    /// Gives the lock back, clearing the stored token on success
    pub async fn release(&self) -> RpcResult<LockStatus> {
        let request = ReleaseRequest {
            token: self.token.lock().clone(),
        };

        let status = self.post("release", &request).await?;
        if status.success {
            *self.token.lock() = None;
        }
        Ok(status)
    }

    async fn post<T: serde::Serialize>(&self, op: &str, body: &T) -> RpcResult<LockStatus> {
        let url = format!("{}/identify-lock/{op}", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|err| RpcError::from_transport(&err))?;

        response
            .json::<LockStatus>()
            .await
            .map_err(|err| RpcError::Failed(err.to_string()))
    }
}
