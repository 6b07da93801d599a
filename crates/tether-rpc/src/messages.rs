//! Wire shapes shared by the coordination services and their clients

use serde::{Deserialize, Serialize};
use serde_json::Value;

use tether_rest::{ApiResponse, RateLimitHeaders};

/// Request to acquire or refresh an identify lock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockRequest {
    /// How long the lock holds before expiring on its own, in ms
    pub duration_ms: u64,
    /// Token from a previous grant, present when refreshing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Request to release a held identify lock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Outcome of a lock operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockStatus {
    pub success: bool,
    /// Grant token, present only on a successful acquire
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Reason for a denial
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl LockStatus {
    #[must_use]
    pub fn granted(token: String) -> Self {
        Self {
            success: true,
            token: Some(token),
            message: None,
        }
    }

    #[must_use]
    pub fn released() -> Self {
        Self {
            success: true,
            token: None,
            message: None,
        }
    }

    #[must_use]
    pub fn denied(message: &str) -> Self {
        Self {
            success: false,
            token: None,
            message: Some(message.to_owned()),
        }
    }
}

/// Request for permission to send, identified by method and endpoint path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizeRequest {
    pub method: String,
    pub url: String,
}

/// Authorization verdict: zero grants the request
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AuthorizeResponse {
    pub reset_after_ms: u64,
}

/// Rate limit headers a client observed, reported to the authority.
/// `bucket = None` means the response confirmed the route is unlimited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitUpdate {
    pub method: String,
    pub url: String,
    pub global: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    pub limit: i64,
    pub remaining: i64,
    pub reset_after: f64,
}

impl RateLimitUpdate {
    #[must_use]
    pub fn new(method: &str, url: &str, headers: Option<&RateLimitHeaders>) -> Self {
        match headers {
            Some(h) => Self {
                method: method.to_owned(),
                url: url.to_owned(),
                global: h.global,
                bucket: Some(h.bucket.clone()),
                limit: h.limit,
                remaining: h.remaining,
                reset_after: h.reset_after,
            },
            None => Self {
                method: method.to_owned(),
                url: url.to_owned(),
                global: false,
                bucket: None,
                limit: 0,
                remaining: 0,
                reset_after: 0.0,
            },
        }
    }

    #[must_use]
    pub fn headers(&self) -> Option<RateLimitHeaders> {
        RateLimitHeaders::from_parts(
            self.global,
            self.bucket.clone(),
            self.limit,
            self.remaining,
            self.reset_after,
        )
    }
}

/// A REST request relayed to the central executor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteRequest {
    pub method: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// The executor's response, with rate limit state flattened in so the
/// relaying client can update its own cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteResponse {
    pub status: u16,
    pub global: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    pub limit: i64,
    pub remaining: i64,
    pub reset_after: f64,
    pub body: Value,
}

impl From<ApiResponse> for RemoteResponse {
    fn from(response: ApiResponse) -> Self {
        let (global, bucket, limit, remaining, reset_after) = match response.rate_limit {
            Some(h) => (h.global, Some(h.bucket), h.limit, h.remaining, h.reset_after),
            None => (false, None, 0, 0, 0.0),
        };
        Self {
            status: response.status,
            global,
            bucket,
            limit,
            remaining,
            reset_after,
            body: response.body,
        }
    }
}

impl From<RemoteResponse> for ApiResponse {
    fn from(response: RemoteResponse) -> Self {
        Self {
            status: response.status,
            rate_limit: RateLimitHeaders::from_parts(
                response.global,
                response.bucket,
                response.limit,
                response.remaining,
                response.reset_after,
            ),
            body: response.body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_round_trips_headers() {
        let headers = RateLimitHeaders {
            global: true,
            bucket: "b1".to_owned(),
            limit: 5,
            remaining: 2,
            reset_after: 1.5,
        };
        let update = RateLimitUpdate::new("GET", "channels/1", Some(&headers));
        assert_eq!(update.headers(), Some(headers));
    }

    #[test]
    fn test_update_without_state_yields_none() {
        let update = RateLimitUpdate::new("GET", "gateway/bot", None);
        assert!(update.headers().is_none());
    }

    #[test]
    fn test_remote_response_preserves_rate_limit_state() {
        let response = ApiResponse {
            status: 200,
            rate_limit: Some(RateLimitHeaders {
                global: false,
                bucket: "b1".to_owned(),
                limit: 5,
                remaining: 4,
                reset_after: 2.0,
            }),
            body: serde_json::json!({"id": "1"}),
        };

        let relayed: ApiResponse = RemoteResponse::from(response.clone()).into();
        assert_eq!(relayed.status, response.status);
        assert_eq!(relayed.rate_limit, response.rate_limit);
        assert_eq!(relayed.body, response.body);
    }
}
