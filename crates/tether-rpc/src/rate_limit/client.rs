//! Remote rate limiter backed by the rate limit service

use std::time::Duration;

use async_trait::async_trait;

use tether_rest::{RateLimitHeaders, RemoteError, RemoteRateLimiter, RoutePath};

use crate::error::RpcError;
use crate::messages::{AuthorizeRequest, AuthorizeResponse, RateLimitUpdate};

/// Plugs the rate limit service into the REST pipeline's authority seam
#[derive(Debug)]
pub struct HttpRateLimiter {
    http: reqwest::Client,
    base_url: String,
}

impl HttpRateLimiter {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }
}

#[async_trait]
impl RemoteRateLimiter for HttpRateLimiter {
    async fn authorize(&self, route: &RoutePath) -> Result<Duration, RemoteError> {
        let url = format!("{}/rate-limit/authorize", self.base_url);
        let request = AuthorizeRequest {
            method: route.method.clone(),
            url: route.url.clone(),
        };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|err| RemoteError::from(RpcError::from_transport(&err)))?;

        let verdict = response
            .json::<AuthorizeResponse>()
            .await
            .map_err(|err| RemoteError::Failed(err.to_string()))?;

        Ok(Duration::from_millis(verdict.reset_after_ms))
    }

    async fn update(
        &self,
        route: &RoutePath,
        headers: Option<&RateLimitHeaders>,
    ) -> Result<(), RemoteError> {
        let url = format!("{}/rate-limit/update", self.base_url);
        let report = RateLimitUpdate::new(&route.method, &route.url, headers);

        self.http
            .post(&url)
            .json(&report)
            .send()
            .await
            .map_err(|err| RemoteError::from(RpcError::from_transport(&err)))?
            .error_for_status()
            .map_err(|err| RemoteError::Failed(err.to_string()))?;

        Ok(())
    }
}
