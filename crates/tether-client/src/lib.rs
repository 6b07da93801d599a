//! # tether-client
//!
//! The top of the stack: owns one gateway connection per shard, admits
//! their logins one at a time, tracks startup until every shard has
//! ingested its initial guilds, and maintains the shared entity cache
//! that gateway dispatches mutate. REST helpers and the coordination
//! service wiring live here too.

pub mod cache;
pub mod dispatch;
pub mod events;
pub mod orchestrator;
pub mod rest;

pub use cache::{CacheStore, CachedGuild};
pub use dispatch::DispatchEvent;
pub use events::ClientEvent;
pub use orchestrator::Client;
