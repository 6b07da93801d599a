//! Voice state entity

use crate::Snowflake;
use serde::{Deserialize, Serialize};

/// A member's voice connection state within a guild
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceState {
    pub user_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    /// `None` means the user has left voice
    pub channel_id: Option<Snowflake>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub deaf: bool,
    #[serde(default)]
    pub mute: bool,
}
