//! Role entity

use crate::Snowflake;
use serde::{Deserialize, Serialize};

/// A guild role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub permissions: u64,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub hoist: bool,
}
