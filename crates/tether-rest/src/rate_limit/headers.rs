//! Rate limit fields parsed out of response headers

use std::time::{Duration, Instant};

use reqwest::header::HeaderMap;

use super::RateLimitSnapshot;

const BUCKET: &str = "x-ratelimit-bucket";
const GLOBAL: &str = "x-ratelimit-global";
const LIMIT: &str = "x-ratelimit-limit";
const REMAINING: &str = "x-ratelimit-remaining";
const RESET_AFTER: &str = "x-ratelimit-reset-after";

/// Rate limit values from the headers of a server response
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitHeaders {
    /// Whether the request tripped the account-wide limit
    pub global: bool,
    /// Server-assigned bucket id
    pub bucket: String,
    pub limit: i64,
    pub remaining: i64,
    /// Seconds until the bucket resets
    pub reset_after: f64,
}

impl RateLimitHeaders {
    /// Parses rate limit state from response headers. Returns `None` when
    /// the bucket header is absent, which marks the route as unlimited.
    #[must_use]
    pub fn from_header_map(headers: &HeaderMap) -> Option<Self> {
        let bucket = header_str(headers, BUCKET)?.to_owned();

        let global = header_str(headers, GLOBAL).is_some_and(|v| v.eq_ignore_ascii_case("true"));
        let limit = header_str(headers, LIMIT)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let remaining = header_str(headers, REMAINING)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let reset_after = header_str(headers, RESET_AFTER)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0);

        Some(Self {
            global,
            bucket,
            limit,
            remaining,
            reset_after,
        })
    }

    /// Reconstructs headers relayed over the coordination services, where
    /// `bucket = None` means the response carried no rate limit state.
    #[must_use]
    pub fn from_parts(
        global: bool,
        bucket: Option<String>,
        limit: i64,
        remaining: i64,
        reset_after: f64,
    ) -> Option<Self> {
        bucket.map(|bucket| Self {
            global,
            bucket,
            limit,
            remaining,
            reset_after,
        })
    }

    #[must_use]
    pub fn snapshot(&self, now: Instant) -> RateLimitSnapshot {
        RateLimitSnapshot {
            remaining: self.remaining,
            limit: self.limit,
            reset_at: Some(now + Duration::from_secs_f64(self.reset_after.max(0.0))),
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
