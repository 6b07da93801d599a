//! # tether-core
//!
//! Domain layer containing identifiers, gateway value objects, and the entity
//! types held in the client cache. This crate has zero dependencies on
//! infrastructure (sockets, HTTP, async runtime).

pub mod entities;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    Channel, ChannelType, GuildData, Member, MemberData, PartialUser, Presence, PresenceStatus,
    PresenceUpdate, Role, User, VoiceState,
};
pub use value_objects::{Intents, Shard, Snowflake, SnowflakeParseError};
