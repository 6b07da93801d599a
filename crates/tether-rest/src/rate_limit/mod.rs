//! Rate limit bookkeeping
//!
//! Buckets are assigned server-side and cannot be predicted ahead of time
//! except by watching response headers; everything here exists to learn them
//! once and never find out the hard way twice.

mod cache;
mod headers;
mod route;
mod state;

pub use cache::RateLimitCache;
pub use headers::RateLimitHeaders;
pub use route::RoutePath;
pub use state::{RateLimit, RateLimitSnapshot};
