//! User entity

use crate::Snowflake;
use serde::{Deserialize, Serialize};

/// A user record, shared globally across guilds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Snowflake,
    pub username: String,
    pub discriminator: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl User {
    /// `username#discriminator` display handle
    #[must_use]
    pub fn tag(&self) -> String {
        format!("{}#{}", self.username, self.discriminator)
    }

    /// Merge newer fields into this record, keeping it the single source of
    /// truth for every view that links to this user id
    pub fn merge(&mut self, incoming: User) {
        debug_assert_eq!(self.id, incoming.id);
        self.username = incoming.username;
        self.discriminator = incoming.discriminator;
        self.avatar = incoming.avatar;
        self.bot = incoming.bot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> User {
        User {
            id: Snowflake::new(1),
            username: name.to_string(),
            discriminator: "0001".to_string(),
            avatar: None,
            bot: false,
        }
    }

    #[test]
    fn test_tag() {
        assert_eq!(user("lando").tag(), "lando#0001");
    }

    #[test]
    fn test_merge_overwrites_fields() {
        let mut cached = user("old");
        cached.merge(user("new"));
        assert_eq!(cached.username, "new");
    }
}
