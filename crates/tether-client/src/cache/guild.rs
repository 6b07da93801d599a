//! Cached form of one guild

use std::collections::{HashMap, HashSet};

use tether_core::{Channel, GuildData, Member, Role, Snowflake, VoiceState};

/// A guild rebuilt from dispatch payloads into keyed maps.
///
/// Members carry user ids, not user records; the owning store joins
/// against its global user map on read.
#[derive(Debug, Clone)]
pub struct CachedGuild {
    pub id: Snowflake,
    pub name: Option<String>,
    pub owner_id: Option<Snowflake>,
    pub member_count: Option<u64>,
    /// Known only as a stub, from a Ready listing or an outage
    pub unavailable: bool,
    /// Shard that owns this guild's events
    pub shard_id: Option<u32>,
    pub members: HashMap<Snowflake, Member>,
    pub channels: HashMap<Snowflake, Channel>,
    pub roles: HashMap<Snowflake, Role>,
    pub voice_states: HashMap<Snowflake, VoiceState>,
    /// Users with a known presence in this guild
    pub presences: HashSet<Snowflake>,
}

impl CachedGuild {
    /// A placeholder for a guild announced but not yet delivered
    #[must_use]
    pub fn unavailable_stub(id: Snowflake, shard_id: Option<u32>) -> Self {
        Self {
            id,
            name: None,
            owner_id: None,
            member_count: None,
            unavailable: true,
            shard_id,
            members: HashMap::new(),
            channels: HashMap::new(),
            roles: HashMap::new(),
            voice_states: HashMap::new(),
            presences: HashSet::new(),
        }
    }

    /// Overwrites scalar fields and keyed collections from a fresh
    /// payload. Collections absent from the payload are left alone so a
    /// partial guild-update cannot wipe state a guild-create delivered.
    pub fn absorb(&mut self, data: &GuildData) {
        debug_assert_eq!(self.id, data.id);
        self.unavailable = data.unavailable;
        if data.name.is_some() {
            self.name.clone_from(&data.name);
        }
        if data.owner_id.is_some() {
            self.owner_id = data.owner_id;
        }
        if data.member_count.is_some() {
            self.member_count = data.member_count;
        }
        for channel in &data.channels {
            self.channels.insert(channel.id, channel.clone());
        }
        for role in &data.roles {
            self.roles.insert(role.id, role.clone());
        }
        for voice_state in &data.voice_states {
            self.upsert_voice_state(voice_state.clone());
        }
    }

    /// Applies a voice state, removing the record when the user left voice
    pub fn upsert_voice_state(&mut self, state: VoiceState) {
        if state.channel_id.is_none() {
            self.voice_states.remove(&state.user_id);
        } else {
            self.voice_states.insert(state.user_id, state);
        }
    }
}
