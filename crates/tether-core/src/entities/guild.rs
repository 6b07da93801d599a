//! Guild payload shape
//!
//! The wire form of a guild as delivered by guild-create/update dispatches.
//! The orchestrator's cache rebuilds this into keyed maps; see the client
//! crate for the cached representation.

use super::member::MemberData;
use super::presence::PresenceUpdate;
use crate::{Channel, Role, Snowflake, VoiceState};
use serde::Deserialize;

/// Raw guild data from a dispatch payload
#[derive(Debug, Clone, Deserialize)]
pub struct GuildData {
    pub id: Snowflake,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub owner_id: Option<Snowflake>,
    #[serde(default)]
    pub member_count: Option<u64>,
    #[serde(default)]
    pub unavailable: bool,
    #[serde(default)]
    pub members: Vec<MemberData>,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub voice_states: Vec<VoiceState>,
    #[serde(default)]
    pub presences: Vec<PresenceUpdate>,
}
