//! Identify payload construction

use serde::Serialize;
use serde_json::Value;

use tether_common::config::IdentityConfig;
use tether_core::{Intents, Shard};

/// Connection properties reported in the identify handshake
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionProperties {
    #[serde(rename = "$os")]
    pub os: String,
    #[serde(rename = "$browser")]
    pub browser: String,
    #[serde(rename = "$device")]
    pub device: String,
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_owned(),
            browser: "tether".to_owned(),
            device: "tether".to_owned(),
        }
    }
}

/// The full identify payload for one shard
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub token: String,
    pub properties: ConnectionProperties,
    pub large_threshold: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence: Option<Value>,
    /// `[shard id, shard count]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shard: Option<[u32; 2]>,
    pub intents: Intents,
}

impl Identity {
    #[must_use]
    pub fn new(token: &str, config: &IdentityConfig, shard: Option<Shard>) -> Self {
        let intents = config
            .intents
            .map_or_else(Intents::default, Intents::from_bits_truncate);

        Self {
            token: token.to_owned(),
            properties: ConnectionProperties::default(),
            large_threshold: config.large_threshold,
            presence: config.presence.clone(),
            shard: shard.map(Shard::to_array),
            intents,
        }
    }

    /// A copy safe to log: the token is redacted
    #[must_use]
    pub fn redacted(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Some(token) = value.get_mut("token") {
            *token = Value::from("<redacted>");
        }
        value
    }
}
