//! Identify lock service and clients
//!
//! A lock serializes identify attempts across shards and processes. The
//! server grants a token on acquire; the holder can refresh or release
//! with that token, and the grant expires on its own after the requested
//! duration so a crashed holder can never wedge the deployment.

mod chain;
mod client;
mod lock;
mod server;

pub use chain::IdentifyLockChain;
pub use client::HttpLockClient;
pub use lock::Lock;
pub use server::LockServer;
