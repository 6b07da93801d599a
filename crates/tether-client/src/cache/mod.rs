//! The shared entity cache
//!
//! Users and presences are stored once, globally; guilds hold member and
//! presence records that reference users by id. Reads join against the
//! global maps so every view always sees the latest user record without
//! shared mutable references.

mod guild;
mod store;

pub use guild::CachedGuild;
pub use store::{CacheStore, MemberView};
