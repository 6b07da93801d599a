//! Value objects shared across the client

mod intents;
mod shard;
mod snowflake;

pub use intents::Intents;
pub use shard::Shard;
pub use snowflake::{Snowflake, SnowflakeParseError};
