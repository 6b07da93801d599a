//! Events the client surfaces to its consumer

use serde_json::Value;

use tether_gateway::CloseDisposition;

/// Everything the client reports upward, across all shards
#[derive(Debug)]
pub enum ClientEvent {
    /// A shard's session is live; its startup window begins
    ShardReady { shard_id: u32, guild_count: usize },
    /// A shard reattached to its prior session
    ShardResumed { shard_id: u32 },
    /// A shard ingested its initial guild snapshot
    ShardStartupComplete { shard_id: u32 },
    /// Every shard finished starting
    StartupComplete,
    /// A shard's socket closed; non-fatal dispositions reconnect on
    /// their own
    GatewayClosed {
        shard_id: u32,
        code: u16,
        disposition: CloseDisposition,
    },
    /// An application event, after cache mutation and any configured
    /// rename
    Dispatch {
        shard_id: u32,
        name: String,
        data: Value,
    },
}
