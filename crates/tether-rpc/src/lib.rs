//! # tether-rpc
//!
//! Coordination services that let multiple client processes behave as one:
//! an identify lock that serializes new sessions across processes, a rate
//! limit authority that owns shared bucket state, and a request executor
//! that funnels REST traffic through a single pipeline. Each service is a
//! small JSON-over-HTTP server with a matching client; the rate limit and
//! request clients plug into `tether-rest` through its remote traits.

pub mod error;
pub mod lock;
pub mod messages;
pub mod rate_limit;
pub mod request;

pub use error::{RpcError, RpcResult};
pub use lock::{HttpLockClient, IdentifyLockChain, Lock, LockServer};
pub use rate_limit::{HttpRateLimiter, RateLimitServer};
pub use request::{HttpRequestExecutor, RequestServer};
