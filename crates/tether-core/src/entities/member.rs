//! Guild member entity

use crate::{Snowflake, User};
use serde::{Deserialize, Serialize};

/// A user's membership in one guild
///
/// Holds the user id only; the full user record lives in the global user
/// cache and is joined on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user_id: Snowflake,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
    #[serde(default)]
    pub joined_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Wire shape of a member: the user arrives embedded
#[derive(Debug, Clone, Deserialize)]
pub struct MemberData {
    pub user: User,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
    #[serde(default)]
    pub joined_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl MemberData {
    /// Split into the membership record and the embedded user record
    #[must_use]
    pub fn into_parts(self) -> (Member, User) {
        let member = Member {
            user_id: self.user.id,
            nick: self.nick,
            roles: self.roles,
            joined_at: self.joined_at,
        };
        (member, self.user)
    }
}
