//! Presence entity

use crate::Snowflake;
use serde::{Deserialize, Serialize};

/// Online status carried in presence updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Idle,
    Dnd,
    #[default]
    Offline,
}

/// A user's presence, shared globally and referenced from guilds by user id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
    pub user_id: Snowflake,
    pub status: PresenceStatus,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    #[serde(default)]
    pub activities: Vec<serde_json::Value>,
}

impl Presence {
    #[must_use]
    pub fn is_offline(&self) -> bool {
        self.status == PresenceStatus::Offline
    }
}

/// Wire shape of a presence update: the user arrives as a partial object
#[derive(Debug, Clone, Deserialize)]
pub struct PresenceUpdate {
    pub user: PartialUser,
    pub status: PresenceStatus,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    #[serde(default)]
    pub activities: Vec<serde_json::Value>,
}

/// Partial user reference inside presence payloads
#[derive(Debug, Clone, Deserialize)]
pub struct PartialUser {
    pub id: Snowflake,
}

impl From<PresenceUpdate> for Presence {
    fn from(update: PresenceUpdate) -> Self {
        Self {
            user_id: update.user.id,
            status: update.status,
            guild_id: update.guild_id,
            activities: update.activities,
        }
    }
}
