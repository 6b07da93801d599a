//! Shard identity - one partition of the overall connection set

use serde::{Deserialize, Serialize};
use std::fmt;

/// `[shard_id, shard_count]` pair identifying one gateway connection's
/// partition of the workload. Immutable once identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shard {
    pub id: u32,
    pub count: u32,
}

impl Shard {
    /// Create a new shard identity
    ///
    /// # Panics
    /// Panics if `id >= count` or `count == 0`.
    #[must_use]
    pub fn new(id: u32, count: u32) -> Self {
        assert!(count > 0, "shard count must be non-zero");
        assert!(id < count, "shard id must be less than shard count");
        Self { id, count }
    }

    /// Wire representation: `[id, count]`
    #[must_use]
    pub fn to_array(self) -> [u32; 2] {
        [self.id, self.count]
    }

    /// Whether a guild is routed to this shard (`(guild_id >> 22) % count`)
    #[must_use]
    pub fn handles_guild(self, guild_id: super::Snowflake) -> bool {
        (guild_id.into_inner() >> 22) % u64::from(self.count) == u64::from(self.id)
    }
}

impl fmt::Display for Shard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.id, self.count)
    }
}
