//! Typed payloads for the frames the connection handles inline

use serde::{Deserialize, Serialize};

use tether_core::Snowflake;

/// Hello payload: the server's required heartbeat cadence
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HelloPayload {
    pub heartbeat_interval: u64,
}

/// The slice of a Ready dispatch the connection and orchestrator act on
#[derive(Debug, Clone, Deserialize)]
pub struct ReadyPayload {
    pub session_id: String,
    /// Guilds this shard will receive, initially unavailable
    #[serde(default)]
    pub guilds: Vec<UnavailableGuild>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UnavailableGuild {
    pub id: Snowflake,
    #[serde(default)]
    pub unavailable: bool,
}

/// Resume payload: reattach to a prior session
#[derive(Debug, Clone, Serialize)]
pub struct ResumePayload {
    pub token: String,
    pub session_id: String,
    pub seq: u64,
}

/// Request for a guild's member list
#[derive(Debug, Clone, Serialize)]
pub struct RequestGuildMembersPayload {
    pub guild_id: Snowflake,
    /// Prefix to match against usernames, empty for all members
    pub query: String,
    /// Maximum members to return, 0 for no cap
    pub limit: u32,
    /// Whether presences come back with the member chunks
    #[serde(default)]
    pub presences: bool,
}
