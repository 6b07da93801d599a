//! Client configuration structs
//!
//! Everything the runtime needs is passed explicitly at construction; there
//! is no ambient global state. Loads from a config file layered with
//! `TETHER_`-prefixed environment variables.

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Main client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Bot token; coerced to a `Bot `-prefixed token when sent
    pub token: String,

    /// Shard ids this process runs; `None` means all of `shard_count`
    #[serde(default)]
    pub shards: Option<Vec<u32>>,

    /// Total shard count; `None` means use the service's recommendation
    #[serde(default)]
    pub shard_count: Option<u32>,

    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub rest: RestConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub gateway: GatewayTuning,

    #[serde(default)]
    pub startup: StartupConfig,

    /// Identify-lock endpoints, acquired in order; the first is the main lock
    #[serde(default)]
    pub identify_locks: Vec<LockEndpoint>,

    #[serde(default)]
    pub rpc: RpcConfig,

    /// Key:value mapping of an event name to the name it is emitted under
    #[serde(default)]
    pub event_renames: HashMap<String, String>,
}

/// Overrides for the identify payload
#[derive(Debug, Clone, Deserialize, Default)]
pub struct IdentityConfig {
    #[serde(default)]
    pub intents: Option<u64>,
    #[serde(default = "default_large_threshold")]
    pub large_threshold: u16,
    /// Initial presence payload, passed through verbatim
    #[serde(default)]
    pub presence: Option<serde_json::Value>,
}

/// REST pipeline settings
#[derive(Debug, Clone, Deserialize)]
pub struct RestConfig {
    #[serde(default = "default_api_url")]
    pub base_url: String,
    #[serde(default = "default_api_version")]
    pub version: String,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            version: default_api_version(),
        }
    }
}

/// Request queue settings
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Interval between queue scans in milliseconds
    #[serde(default = "default_queue_scan_interval_ms")]
    pub scan_interval_ms: u64,
    /// How long a queued request may wait before timing out; `None` waits
    /// until the rate limit clears
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: default_queue_scan_interval_ms(),
            request_timeout_ms: None,
        }
    }
}

impl QueueConfig {
    #[must_use]
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

/// Gateway connection tunables
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayTuning {
    /// Query parameters appended to the websocket url
    #[serde(default = "default_ws_params")]
    pub ws_params: String,
    /// Seconds to wait before retrying endpoint resolution after a bad status
    #[serde(default = "default_url_retry_wait_secs")]
    pub url_retry_wait_secs: u64,
    /// Fixed delay before retrying identify after a lock refusal, in ms
    #[serde(default = "default_identify_retry_wait_ms")]
    pub identify_retry_wait_ms: u64,
    /// Buffer pushed onto the safe-identify timestamp per admitted login, ms
    #[serde(default = "default_login_gate_buffer_ms")]
    pub login_gate_buffer_ms: u64,
}

impl Default for GatewayTuning {
    fn default() -> Self {
        Self {
            ws_params: default_ws_params(),
            url_retry_wait_secs: default_url_retry_wait_secs(),
            identify_retry_wait_ms: default_identify_retry_wait_ms(),
            login_gate_buffer_ms: default_login_gate_buffer_ms(),
        }
    }
}

/// Startup window behavior
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StartupConfig {
    /// Emit non-guild events before startup completes
    #[serde(default)]
    pub allow_events_during_startup: bool,
    /// Also pass guild-create events through during startup
    #[serde(default)]
    pub emit_guild_creates_during_startup: bool,
    /// Force startup completion after this many milliseconds
    #[serde(default)]
    pub force_startup_timeout_ms: Option<u64>,
    /// Interval between user/presence cache sweeps, seconds
    #[serde(default = "default_cache_sweep_interval_secs")]
    pub cache_sweep_interval_secs: u64,
}

/// One identify-lock endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct LockEndpoint {
    pub url: String,
    /// How long the lock stays held without a refresh, in milliseconds
    pub duration_ms: u64,
    /// Proceed as if acquired when the lock server is unreachable
    #[serde(default)]
    pub allow_fallback: bool,
}

/// Remote coordination endpoints
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RpcConfig {
    /// Remote rate-limit authority endpoint
    #[serde(default)]
    pub rate_limit_url: Option<String>,
    /// Remote request executor endpoint
    #[serde(default)]
    pub request_url: Option<String>,
    /// Handle locally when the remote service is unreachable
    #[serde(default)]
    pub allow_fallback: bool,
}

// Default value functions
fn default_large_threshold() -> u16 {
    250
}

fn default_api_url() -> String {
    "https://discordapp.com/api".to_string()
}

fn default_api_version() -> String {
    "v6".to_string()
}

fn default_queue_scan_interval_ms() -> u64 {
    1_000
}

fn default_ws_params() -> String {
    "?v=6&encoding=json".to_string()
}

fn default_url_retry_wait_secs() -> u64 {
    10
}

fn default_identify_retry_wait_ms() -> u64 {
    1_000
}

fn default_login_gate_buffer_ms() -> u64 {
    5_000
}

fn default_cache_sweep_interval_secs() -> u64 {
    3_600
}

impl ClientConfig {
    /// Minimal configuration carrying only a token
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            shards: None,
            shard_count: None,
            identity: IdentityConfig::default(),
            rest: RestConfig::default(),
            queue: QueueConfig::default(),
            gateway: GatewayTuning::default(),
            startup: StartupConfig::default(),
            identify_locks: Vec::new(),
            rpc: RpcConfig::default(),
            event_renames: HashMap::new(),
        }
    }

    /// Load configuration from an optional file layered with environment
    /// variables prefixed `TETHER_` (e.g. `TETHER_TOKEN`).
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("TETHER")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .and_then(config::Config::try_deserialize)
            .map_err(ConfigError::Load)
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.trim().is_empty() {
            return Err(ConfigError::Invalid("token must not be empty"));
        }
        if let (Some(shards), Some(count)) = (&self.shards, self.shard_count) {
            if shards.iter().any(|&id| id >= count) {
                return Err(ConfigError::Invalid("shard id exceeds shard count"));
            }
        }
        if self.identify_locks.iter().any(|l| l.duration_ms == 0) {
            return Err(ConfigError::Invalid("lock duration must be larger than 0"));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[source] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_defaults() {
        let config = ClientConfig::new("abc123");
        assert_eq!(config.rest.version, "v6");
        assert_eq!(config.queue.scan_interval(), Duration::from_secs(1));
        assert!(config.queue.request_timeout().is_none());
        assert_eq!(config.gateway.login_gate_buffer_ms, 5_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_token() {
        let config = ClientConfig::new("  ");
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_out_of_range_shard() {
        let mut config = ClientConfig::new("abc123");
        config.shards = Some(vec![0, 2]);
        config.shard_count = Some(2);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_zero_lock_duration() {
        let mut config = ClientConfig::new("abc123");
        config.identify_locks.push(LockEndpoint {
            url: "http://127.0.0.1:9000".to_string(),
            duration_ms: 0,
            allow_fallback: false,
        });
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
