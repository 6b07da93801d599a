//! Shared rate limit authority
//!
//! One process owns the rate limit cache; every other process asks it for
//! permission before sending and reports the headers it observes. This
//! keeps a multi-process deployment inside limits that are accounted
//! per token, not per process.

mod client;
mod server;

pub use client::HttpRateLimiter;
pub use server::RateLimitServer;
