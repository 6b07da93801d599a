//! Central request execution
//!
//! Instead of each process running its own REST pipeline, requests can be
//! relayed to one process that sends them all, giving it complete local
//! knowledge of rate limit state.

mod client;
mod server;

pub use client::HttpRequestExecutor;
pub use server::RequestServer;
