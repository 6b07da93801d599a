//! Dispatch payload parsing and cache application
//!
//! Each gateway dispatch the client understands is decoded into a typed
//! variant here, applied to the store, then the raw payload is forwarded
//! to the consumer. Unrecognized events skip the cache and forward as-is.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use tether_core::{
    Channel, GuildData, MemberData, PresenceUpdate, Role, Snowflake, User, VoiceState,
};

use crate::cache::CacheStore;

/// A member payload with the owning guild id alongside it
#[derive(Debug, Deserialize)]
pub struct GuildMemberEvent {
    pub guild_id: Snowflake,
    #[serde(flatten)]
    pub member: MemberData,
}

#[derive(Debug, Deserialize)]
pub struct MemberRemoveEvent {
    pub guild_id: Snowflake,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct MembersChunkEvent {
    pub guild_id: Snowflake,
    pub members: Vec<MemberData>,
    #[serde(default)]
    pub presences: Vec<PresenceUpdate>,
}

#[derive(Debug, Deserialize)]
pub struct RoleEvent {
    pub guild_id: Snowflake,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct RoleDeleteEvent {
    pub guild_id: Snowflake,
    pub role_id: Snowflake,
}

#[derive(Debug, Deserialize)]
pub struct GuildDeleteEvent {
    pub id: Snowflake,
    #[serde(default)]
    pub unavailable: bool,
}

/// Dispatch events the cache knows how to apply
#[derive(Debug)]
pub enum DispatchEvent {
    GuildCreate(Box<GuildData>),
    GuildUpdate(Box<GuildData>),
    GuildDelete(GuildDeleteEvent),
    GuildMemberAdd(Box<GuildMemberEvent>),
    GuildMemberUpdate(Box<GuildMemberEvent>),
    GuildMemberRemove(MemberRemoveEvent),
    GuildMembersChunk(MembersChunkEvent),
    ChannelCreate(Channel),
    ChannelUpdate(Channel),
    ChannelDelete(Channel),
    RoleCreate(RoleEvent),
    RoleUpdate(RoleEvent),
    RoleDelete(RoleDeleteEvent),
    VoiceStateUpdate(VoiceState),
    PresenceUpdate(Box<PresenceUpdate>),
    UserUpdate(User),
}

impl DispatchEvent {
    /// Decodes a recognized event name; `None` for names the cache does
    /// not track. A payload that fails to decode is treated the same
    /// way so a malformed frame cannot poison the cache.
    #[must_use]
    pub fn parse(name: &str, data: &Value) -> Option<Self> {
        fn decode<T: serde::de::DeserializeOwned>(name: &str, data: &Value) -> Option<T> {
            match serde_json::from_value(data.clone()) {
                Ok(parsed) => Some(parsed),
                Err(err) => {
                    debug!(event = name, %err, "dispatch payload failed to decode");
                    None
                }
            }
        }

        let event = match name {
            "GUILD_CREATE" => Self::GuildCreate(Box::new(decode(name, data)?)),
            "GUILD_UPDATE" => Self::GuildUpdate(Box::new(decode(name, data)?)),
            "GUILD_DELETE" => Self::GuildDelete(decode(name, data)?),
            "GUILD_MEMBER_ADD" => Self::GuildMemberAdd(Box::new(decode(name, data)?)),
            "GUILD_MEMBER_UPDATE" => Self::GuildMemberUpdate(Box::new(decode(name, data)?)),
            "GUILD_MEMBER_REMOVE" => Self::GuildMemberRemove(decode(name, data)?),
            "GUILD_MEMBERS_CHUNK" => Self::GuildMembersChunk(decode(name, data)?),
            "CHANNEL_CREATE" => Self::ChannelCreate(decode(name, data)?),
            "CHANNEL_UPDATE" => Self::ChannelUpdate(decode(name, data)?),
            "CHANNEL_DELETE" => Self::ChannelDelete(decode(name, data)?),
            "GUILD_ROLE_CREATE" => Self::RoleCreate(decode(name, data)?),
            "GUILD_ROLE_UPDATE" => Self::RoleUpdate(decode(name, data)?),
            "GUILD_ROLE_DELETE" => Self::RoleDelete(decode(name, data)?),
            "VOICE_STATE_UPDATE" => Self::VoiceStateUpdate(decode(name, data)?),
            "PRESENCE_UPDATE" => Self::PresenceUpdate(Box::new(decode(name, data)?)),
            "USER_UPDATE" => Self::UserUpdate(decode(name, data)?),
            _ => return None,
        };
        Some(event)
    }

    /// True for the guild delivery events counted against a shard's
    /// startup window
    #[must_use]
    pub fn is_guild_create(name: &str) -> bool {
        name == "GUILD_CREATE"
    }

    /// Mutates the store. Returns the guild id the event touched, when
    /// it has one.
    pub fn apply(self, store: &CacheStore, shard_id: Option<u32>) -> Option<Snowflake> {
        match self {
            Self::GuildCreate(data) | Self::GuildUpdate(data) => {
                let id = data.id;
                store.upsert_guild(*data, shard_id);
                Some(id)
            }
            Self::GuildDelete(event) => {
                store.remove_guild(event.id, event.unavailable);
                Some(event.id)
            }
            Self::GuildMemberAdd(event) | Self::GuildMemberUpdate(event) => {
                store.upsert_member(event.guild_id, event.member);
                Some(event.guild_id)
            }
            Self::GuildMemberRemove(event) => {
                store.remove_member(event.guild_id, event.user.id);
                Some(event.guild_id)
            }
            Self::GuildMembersChunk(event) => {
                for member in event.members {
                    store.upsert_member(event.guild_id, member);
                }
                for presence in event.presences {
                    store.upsert_presence(presence.into());
                }
                Some(event.guild_id)
            }
            Self::ChannelCreate(channel) | Self::ChannelUpdate(channel) => {
                let guild_id = channel.guild_id?;
                store.with_guild_mut(guild_id, |guild| {
                    guild.channels.insert(channel.id, channel);
                });
                Some(guild_id)
            }
            Self::ChannelDelete(channel) => {
                let guild_id = channel.guild_id?;
                store.with_guild_mut(guild_id, |guild| {
                    guild.channels.remove(&channel.id);
                });
                Some(guild_id)
            }
            Self::RoleCreate(event) | Self::RoleUpdate(event) => {
                store.with_guild_mut(event.guild_id, |guild| {
                    guild.roles.insert(event.role.id, event.role);
                });
                Some(event.guild_id)
            }
            Self::RoleDelete(event) => {
                store.with_guild_mut(event.guild_id, |guild| {
                    guild.roles.remove(&event.role_id);
                });
                Some(event.guild_id)
            }
            Self::VoiceStateUpdate(state) => {
                let guild_id = state.guild_id?;
                store.with_guild_mut(guild_id, |guild| {
                    guild.upsert_voice_state(state);
                });
                Some(guild_id)
            }
            Self::PresenceUpdate(update) => {
                let guild_id = update.guild_id;
                store.upsert_presence((*update).into());
                guild_id
            }
            Self::UserUpdate(user) => {
                store.upsert_user(user);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seeded_store() -> CacheStore {
        let store = CacheStore::new();
        let data: GuildData = serde_json::from_value(json!({
            "id": "5",
            "name": "g",
            "members": [
                {"user": {"id": "1", "username": "a", "discriminator": "0"}}
            ]
        }))
        .unwrap();
        store.upsert_guild(data, Some(0));
        store
    }

    #[test]
    fn test_unknown_event_is_not_cached() {
        assert!(DispatchEvent::parse("TYPING_START", &json!({})).is_none());
    }

    #[test]
    fn test_malformed_payload_is_skipped() {
        assert!(DispatchEvent::parse("GUILD_CREATE", &json!({"no_id": true})).is_none());
    }

    #[test]
    fn test_member_add_updates_guild_and_user() {
        let store = seeded_store();
        let event = DispatchEvent::parse(
            "GUILD_MEMBER_ADD",
            &json!({
                "guild_id": "5",
                "user": {"id": "2", "username": "b", "discriminator": "0"},
                "nick": "newbie"
            }),
        )
        .unwrap();

        assert_eq!(event.apply(&store, Some(0)), Some(Snowflake::new(5)));
        let view = store.member(Snowflake::new(5), Snowflake::new(2)).unwrap();
        assert_eq!(view.member.nick.as_deref(), Some("newbie"));
        assert_eq!(view.user.username, "b");
    }

    #[test]
    fn test_role_lifecycle() {
        let store = seeded_store();
        DispatchEvent::parse(
            "GUILD_ROLE_CREATE",
            &json!({"guild_id": "5", "role": {"id": "9", "name": "mods"}}),
        )
        .unwrap()
        .apply(&store, None);
        assert_eq!(
            store
                .with_guild(Snowflake::new(5), |g| g.roles.len())
                .unwrap(),
            1
        );

        DispatchEvent::parse(
            "GUILD_ROLE_DELETE",
            &json!({"guild_id": "5", "role_id": "9"}),
        )
        .unwrap()
        .apply(&store, None);
        assert_eq!(
            store
                .with_guild(Snowflake::new(5), |g| g.roles.len())
                .unwrap(),
            0
        );
    }

    #[test]
    fn test_members_chunk_ingests_batch() {
        let store = seeded_store();
        DispatchEvent::parse(
            "GUILD_MEMBERS_CHUNK",
            &json!({
                "guild_id": "5",
                "members": [
                    {"user": {"id": "2", "username": "b", "discriminator": "0"}},
                    {"user": {"id": "3", "username": "c", "discriminator": "0"}}
                ]
            }),
        )
        .unwrap()
        .apply(&store, None);

        assert_eq!(store.user_count(), 3);
        assert_eq!(
            store
                .with_guild(Snowflake::new(5), |g| g.members.len())
                .unwrap(),
            3
        );
    }

    #[test]
    fn test_user_update_reaches_member_views() {
        let store = seeded_store();
        DispatchEvent::parse(
            "USER_UPDATE",
            &json!({"id": "1", "username": "renamed", "discriminator": "0"}),
        )
        .unwrap()
        .apply(&store, None);

        let view = store.member(Snowflake::new(5), Snowflake::new(1)).unwrap();
        assert_eq!(view.user.username, "renamed");
    }
}
