//! Request and response shapes used across the REST pipeline

use reqwest::Method;
use serde_json::Value;

use crate::rate_limit::{RateLimitHeaders, RoutePath};

/// A REST request with its rate limit identity computed up front
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub route: RoutePath,
    /// JSON body, absent for bodiless methods
    pub body: Option<Value>,
    /// Extra headers sent alongside the defaults
    pub headers: Vec<(String, String)>,
    /// Execute locally even when a remote request executor is configured
    pub local: bool,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, url: &str, body: Option<Value>) -> Self {
        let route = RoutePath::new(&method, url);
        Self {
            method,
            route,
            body,
            headers: Vec::new(),
            local: false,
        }
    }

    #[must_use]
    pub fn get(url: &str) -> Self {
        Self::new(Method::GET, url, None)
    }

    #[must_use]
    pub fn post(url: &str, body: Value) -> Self {
        Self::new(Method::POST, url, Some(body))
    }

    #[must_use]
    pub fn patch(url: &str, body: Value) -> Self {
        Self::new(Method::PATCH, url, Some(body))
    }

    #[must_use]
    pub fn delete(url: &str) -> Self {
        Self::new(Method::DELETE, url, None)
    }

    /// Attaches a custom header to this request
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Forces local execution, ignoring any configured request executor
    #[must_use]
    pub fn local(mut self) -> Self {
        self.local = true;
        self
    }
}

/// Outcome of a sent request, reduced to what callers and the rate limit
/// cache need. Carrying parsed header state instead of a raw header map
/// lets responses relay cleanly through the request coordination service.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    /// Rate limit state from the response, `None` when the route is unlimited
    pub rate_limit: Option<RateLimitHeaders>,
    pub body: Value,
}

impl ApiResponse {
    /// Whether the server rejected the request for exceeding a rate limit
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
