//! Global entity store shared by every shard

use dashmap::DashMap;
use tracing::debug;

use tether_core::{GuildData, Member, MemberData, Presence, Snowflake, User};

use super::CachedGuild;

/// A member joined with its user record at read time
#[derive(Debug, Clone)]
pub struct MemberView {
    pub member: Member,
    pub user: User,
}

/// Owns every cached entity. Guilds are partitioned by shard; users and
/// presences are global so one update is seen by every guild that
/// references the id.
#[derive(Debug, Default)]
pub struct CacheStore {
    guilds: DashMap<Snowflake, CachedGuild>,
    users: DashMap<Snowflake, User>,
    presences: DashMap<Snowflake, Presence>,
}

impl CacheStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn guild_count(&self) -> usize {
        self.guilds.len()
    }

    #[must_use]
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn presence_count(&self) -> usize {
        self.presences.len()
    }

    /// Runs `f` against a cached guild, if present
    pub fn with_guild<R>(&self, id: Snowflake, f: impl FnOnce(&CachedGuild) -> R) -> Option<R> {
        self.guilds.get(&id).map(|guild| f(&guild))
    }

    /// Mutating counterpart of [`with_guild`](Self::with_guild)
    pub fn with_guild_mut<R>(
        &self,
        id: Snowflake,
        f: impl FnOnce(&mut CachedGuild) -> R,
    ) -> Option<R> {
        self.guilds.get_mut(&id).map(|mut guild| f(&mut guild))
    }

    #[must_use]
    pub fn user(&self, id: Snowflake) -> Option<User> {
        self.users.get(&id).map(|user| user.clone())
    }

    #[must_use]
    pub fn presence(&self, user_id: Snowflake) -> Option<Presence> {
        self.presences.get(&user_id).map(|presence| presence.clone())
    }

    /// A guild member with its user record joined in
    #[must_use]
    pub fn member(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<MemberView> {
        let member = self
            .guilds
            .get(&guild_id)
            .and_then(|guild| guild.members.get(&user_id).cloned())?;
        let user = self.user(user_id)?;
        Some(MemberView { member, user })
    }

    /// Inserts a stub for a guild announced in a Ready listing
    pub fn insert_unavailable(&self, id: Snowflake, shard_id: Option<u32>) {
        self.guilds
            .entry(id)
            .or_insert_with(|| CachedGuild::unavailable_stub(id, shard_id));
    }

    /// Ingests a full guild payload, splitting embedded users and
    /// presences into the global maps
    pub fn upsert_guild(&self, data: GuildData, shard_id: Option<u32>) {
        let mut guild = self
            .guilds
            .entry(data.id)
            .or_insert_with(|| CachedGuild::unavailable_stub(data.id, shard_id));
        guild.absorb(&data);

        for member_data in data.members {
            let (member, user) = member_data.into_parts();
            guild.members.insert(member.user_id, member);
            self.upsert_user(user);
        }
        // the guild entry is still locked here, so the global presence
        // map is written directly instead of through upsert_presence
        for update in data.presences {
            let presence = Presence::from(update);
            if presence.is_offline() {
                guild.presences.remove(&presence.user_id);
                self.presences.remove(&presence.user_id);
            } else {
                guild.presences.insert(presence.user_id);
                self.presences.insert(presence.user_id, presence);
            }
        }
    }

    /// Removes a guild outright, or downgrades it to a stub during an
    /// outage
    pub fn remove_guild(&self, id: Snowflake, unavailable: bool) {
        if unavailable {
            // an outage notice for an unknown guild still gets a stub
            match self.guilds.get_mut(&id) {
                Some(mut guild) => guild.unavailable = true,
                None => {
                    self.guilds
                        .insert(id, CachedGuild::unavailable_stub(id, None));
                }
            }
        } else {
            self.guilds.remove(&id);
        }
    }

    /// Merges a user into the global map, updating in place so every
    /// member view referencing this id sees the change
    pub fn upsert_user(&self, user: User) {
        match self.users.get_mut(&user.id) {
            Some(mut cached) => cached.merge(user),
            None => {
                self.users.insert(user.id, user);
            }
        }
    }

    /// Records a presence; an offline presence is dropped from the
    /// global map since offline is the default for unknown users
    pub fn upsert_presence(&self, presence: Presence) {
        if presence.is_offline() {
            self.presences.remove(&presence.user_id);
            if let Some(guild_id) = presence.guild_id {
                if let Some(mut guild) = self.guilds.get_mut(&guild_id) {
                    guild.presences.remove(&presence.user_id);
                }
            }
        } else {
            if let Some(guild_id) = presence.guild_id {
                if let Some(mut guild) = self.guilds.get_mut(&guild_id) {
                    guild.presences.insert(presence.user_id);
                }
            }
            self.presences.insert(presence.user_id, presence);
        }
    }

    pub fn upsert_member(&self, guild_id: Snowflake, data: MemberData) {
        let (member, user) = data.into_parts();
        if let Some(mut guild) = self.guilds.get_mut(&guild_id) {
            guild.members.insert(member.user_id, member);
        }
        self.upsert_user(user);
    }

    pub fn remove_member(&self, guild_id: Snowflake, user_id: Snowflake) {
        if let Some(mut guild) = self.guilds.get_mut(&guild_id) {
            guild.members.remove(&user_id);
            guild.presences.remove(&user_id);
            guild.voice_states.remove(&user_id);
        }
    }

    /// Drops users and presences no longer referenced by any guild.
    /// Runs on a fixed interval; the tolerated staleness window is the
    /// sweep interval itself.
    pub fn sweep(&self) {
        let mut referenced = std::collections::HashSet::new();
        for guild in &self.guilds {
            referenced.extend(guild.members.keys().copied());
            referenced.extend(guild.presences.iter().copied());
        }

        let users_before = self.users.len();
        self.users.retain(|id, _| referenced.contains(id));
        let presences_before = self.presences.len();
        self.presences.retain(|id, _| referenced.contains(id));

        debug!(
            users_dropped = users_before - self.users.len(),
            presences_dropped = presences_before - self.presences.len(),
            "cache sweep finished"
        );
    }
}
