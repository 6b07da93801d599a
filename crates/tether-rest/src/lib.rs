//! # tether-rest
//!
//! Rate-limit-aware REST pipeline: bucket inference from response headers,
//! a template-seeded rate-limit cache, a queue for requests the limiter
//! holds back, and the client that ties them together. Execution and
//! authorization can each be delegated to a remote coordination service.

pub mod client;
pub mod error;
pub mod queue;
pub mod rate_limit;
pub mod remote;
pub mod request;

pub use client::{Api, ApiOptions};
pub use error::{ApiError, ApiResult};
pub use queue::RequestQueue;
pub use rate_limit::{RateLimit, RateLimitCache, RateLimitHeaders, RateLimitSnapshot, RoutePath};
pub use remote::{RemoteError, RemoteRateLimiter, RemoteRequestExecutor};
pub use request::{ApiRequest, ApiResponse};
