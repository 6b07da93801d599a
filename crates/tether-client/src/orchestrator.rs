//! Multi-shard orchestration
//!
//! One [`Client`] owns a REST pipeline, the shared entity cache, and one
//! gateway connection per shard. Shards are admitted to the login flow
//! one at a time; a shard counts as started once every guild announced
//! in its Ready listing has arrived (or a configured timeout forces it).

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use tether_common::config::ClientConfig;
use tether_common::error::{AppError, AppResult};
use tether_core::{Shard, Snowflake};
use tether_gateway::{
    GatewayConnection, GatewayOptions, IdentifyGate, RequestGuildMembersPayload, ShardEvent,
};
use tether_rest::{Api, ApiError, ApiOptions, ApiRequest, RemoteError};
use tether_rpc::{HttpLockClient, HttpRateLimiter, HttpRequestExecutor, IdentifyLockChain};

use crate::cache::CacheStore;
use crate::dispatch::DispatchEvent;
use crate::events::ClientEvent;

/// Everything that arrives at the orchestration loop, from any shard
enum Pump {
    Event(u32, ShardEvent),
    /// A shard's run loop stopped with a terminal error
    Fatal(u32, AppError),
    /// The force-startup timer fired before the shard finished
    ForceStart(u32),
}

/// Per-shard startup bookkeeping
#[derive(Debug, Default)]
struct StartupTracker {
    /// Guilds announced in Ready that have not arrived yet
    pending: HashSet<Snowflake>,
    saw_ready: bool,
    complete: bool,
}

/// The public client surface
pub struct Client {
    config: ClientConfig,
    api: Arc<Api>,
    cache: Arc<CacheStore>,
    connections: HashMap<u32, Arc<GatewayConnection>>,
    events: mpsc::UnboundedSender<ClientEvent>,
}

impl Client {
    /// Builds the client and the channel its events arrive on. Remote
    /// coordination clients are wired here from the config.
    pub fn new(config: ClientConfig) -> AppResult<(Self, mpsc::UnboundedReceiver<ClientEvent>)> {
        config
            .validate()
            .map_err(|err| AppError::Config(err.to_string()))?;

        let options = ApiOptions::from_config(
            &config.token,
            &config.rest,
            &config.queue,
            config.rpc.allow_fallback,
        );
        let api = Arc::new(Api::new(options).map_err(AppError::internal)?);

        if let Some(url) = &config.rpc.rate_limit_url {
            api.use_remote_rate_limiter(Arc::new(HttpRateLimiter::new(url)));
        }
        if let Some(url) = &config.rpc.request_url {
            api.use_remote_request_executor(Arc::new(HttpRequestExecutor::new(url)));
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let client = Self {
            config,
            api,
            cache: Arc::new(CacheStore::new()),
            connections: HashMap::new(),
            events: events_tx,
        };
        Ok((client, events_rx))
    }

    #[must_use]
    pub fn api(&self) -> &Arc<Api> {
        &self.api
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// Asks a shard's connection for a guild's member list; chunks
    /// arrive as dispatches
    pub fn request_guild_members(
        &self,
        shard_id: u32,
        payload: &RequestGuildMembersPayload,
    ) -> AppResult<()> {
        let connection = self.connections.get(&shard_id).ok_or_else(|| {
            AppError::Transport(format!("shard {shard_id} is not running"))
        })?;
        connection.request_guild_members(payload)
    }

    /// Runs every configured shard until a fatal error. Returns only on
    /// failure; a healthy client runs indefinitely.
    pub async fn run(mut self) -> AppResult<()> {
        self.api.start_queue();

        let shard_count = self.resolve_shard_count().await?;
        let shard_ids: Vec<u32> = self
            .config
            .shards
            .clone()
            .unwrap_or_else(|| (0..shard_count).collect());
        if let Some(&bad) = shard_ids.iter().find(|&&id| id >= shard_count) {
            return Err(AppError::InvalidShardConfig(format!(
                "shard id {bad} exceeds shard count {shard_count}"
            )));
        }
        info!(shard_count, shards = ?shard_ids, "starting client");

        let lock_chain = Arc::new(IdentifyLockChain::new(
            self.config
                .identify_locks
                .iter()
                .map(|endpoint| {
                    HttpLockClient::new(
                        &endpoint.url,
                        Duration::from_millis(endpoint.duration_ms),
                        endpoint.allow_fallback,
                    )
                })
                .collect(),
        ));
        let gate = Arc::new(IdentifyGate::new());

        let (pump_tx, mut pump_rx) = mpsc::unbounded_channel();

        // Build every connection up front; spawn their run loops one at
        // a time as startup progresses.
        let mut waiting: VecDeque<u32> = VecDeque::new();
        for &shard_id in &shard_ids {
            let options = GatewayOptions {
                token: self.config.token.clone(),
                identity: self.config.identity.clone(),
                shard: Some(Shard::new(shard_id, shard_count)),
                tuning: self.config.gateway.clone(),
                lock_chain: Arc::clone(&lock_chain),
                gate: Arc::clone(&gate),
            };
            let (connection, mut shard_events) =
                GatewayConnection::new(options, Arc::clone(&self.api));
            self.connections.insert(shard_id, connection);
            waiting.push_back(shard_id);

            let tx = pump_tx.clone();
            tokio::spawn(async move {
                while let Some(event) = shard_events.recv().await {
                    if tx.send(Pump::Event(shard_id, event)).is_err() {
                        break;
                    }
                }
            });
        }

        self.start_sweeper();

        let mut trackers: HashMap<u32, StartupTracker> = HashMap::new();
        let mut started: HashSet<u32> = HashSet::new();
        let mut startup_complete = false;

        self.admit_next(&mut waiting, &mut trackers, &pump_tx);

        while let Some(message) = pump_rx.recv().await {
            match message {
                Pump::Event(shard_id, event) => {
                    self.handle_shard_event(
                        shard_id,
                        event,
                        &mut trackers,
                        startup_complete,
                    );
                    self.note_progress(
                        shard_id,
                        &shard_ids,
                        &mut waiting,
                        &mut trackers,
                        &mut started,
                        &mut startup_complete,
                        &pump_tx,
                    );
                }
                Pump::ForceStart(shard_id) => {
                    let tracker = trackers.entry(shard_id).or_default();
                    if !tracker.complete {
                        warn!(
                            shard_id,
                            pending = tracker.pending.len(),
                            "startup timed out, forcing completion"
                        );
                        tracker.complete = true;
                        let _ = self
                            .events
                            .send(ClientEvent::ShardStartupComplete { shard_id });
                        self.note_progress(
                            shard_id,
                            &shard_ids,
                            &mut waiting,
                            &mut trackers,
                            &mut started,
                            &mut startup_complete,
                            &pump_tx,
                        );
                    }
                }
                Pump::Fatal(shard_id, err) => {
                    warn!(shard_id, %err, "shard stopped with a fatal error");
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Spawns the next waiting shard's run loop and arms its force
    /// timer, if one is configured
    fn admit_next(
        &self,
        waiting: &mut VecDeque<u32>,
        trackers: &mut HashMap<u32, StartupTracker>,
        pump_tx: &mpsc::UnboundedSender<Pump>,
    ) {
        let Some(shard_id) = waiting.pop_front() else {
            return;
        };
        trackers.insert(shard_id, StartupTracker::default());

        if let Some(connection) = self.connections.get(&shard_id) {
            info!(shard_id, "admitting shard");
            let connection = Arc::clone(connection);
            let tx = pump_tx.clone();
            tokio::spawn(async move {
                if let Err(err) = connection.run().await {
                    let _ = tx.send(Pump::Fatal(shard_id, err));
                }
            });
        }

        if let Some(timeout_ms) = self.config.startup.force_startup_timeout_ms {
            let tx = pump_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(timeout_ms)).await;
                let _ = tx.send(Pump::ForceStart(shard_id));
            });
        }
    }

    /// Applies one shard event to the cache and the startup trackers,
    /// forwarding whatever the consumer should see
    fn handle_shard_event(
        &self,
        shard_id: u32,
        event: ShardEvent,
        trackers: &mut HashMap<u32, StartupTracker>,
        startup_complete: bool,
    ) {
        match event {
            ShardEvent::Hello {
                heartbeat_interval_ms,
            } => {
                debug!(shard_id, heartbeat_interval_ms, "shard received hello");
            }
            ShardEvent::Identifying | ShardEvent::Resuming => {}
            ShardEvent::Ready(payload) => {
                let tracker = trackers.entry(shard_id).or_default();
                tracker.saw_ready = true;
                tracker.pending = payload.guilds.iter().map(|guild| guild.id).collect();
                for guild in &payload.guilds {
                    self.cache.insert_unavailable(guild.id, Some(shard_id));
                }
                let _ = self.events.send(ClientEvent::ShardReady {
                    shard_id,
                    guild_count: payload.guilds.len(),
                });
                if tracker.pending.is_empty() {
                    Self::complete_tracker(tracker, shard_id, &self.events);
                }
            }
            ShardEvent::Resumed => {
                // a resumed session already delivered its guilds
                let tracker = trackers.entry(shard_id).or_default();
                if !tracker.complete {
                    Self::complete_tracker(tracker, shard_id, &self.events);
                }
                let _ = self.events.send(ClientEvent::ShardResumed { shard_id });
            }
            ShardEvent::HeartbeatAck { latency_ms } => {
                debug!(shard_id, latency_ms, "heartbeat acknowledged");
            }
            ShardEvent::Dispatch { name, data, .. } => {
                self.handle_dispatch(shard_id, &name, data, trackers, startup_complete);
            }
            ShardEvent::Closed { code, disposition } => {
                let _ = self.events.send(ClientEvent::GatewayClosed {
                    shard_id,
                    code,
                    disposition,
                });
            }
        }
    }

    fn handle_dispatch(
        &self,
        shard_id: u32,
        name: &str,
        data: serde_json::Value,
        trackers: &mut HashMap<u32, StartupTracker>,
        startup_complete: bool,
    ) {
        let touched = DispatchEvent::parse(name, &data)
            .and_then(|event| event.apply(&self.cache, Some(shard_id)));

        let in_startup = trackers
            .get(&shard_id)
            .is_some_and(|tracker| tracker.saw_ready && !tracker.complete);

        if DispatchEvent::is_guild_create(name) {
            if in_startup {
                if let (Some(tracker), Some(guild_id)) = (trackers.get_mut(&shard_id), touched) {
                    tracker.pending.remove(&guild_id);
                    if tracker.pending.is_empty() {
                        Self::complete_tracker(tracker, shard_id, &self.events);
                    }
                }
                if !self.config.startup.emit_guild_creates_during_startup {
                    return;
                }
            }
        } else if !startup_complete && !self.config.startup.allow_events_during_startup {
            return;
        }

        let emitted = self
            .config
            .event_renames
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_owned());
        let _ = self.events.send(ClientEvent::Dispatch {
            shard_id,
            name: emitted,
            data,
        });
    }

    fn complete_tracker(
        tracker: &mut StartupTracker,
        shard_id: u32,
        events: &mpsc::UnboundedSender<ClientEvent>,
    ) {
        tracker.complete = true;
        info!(shard_id, "shard startup complete");
        let _ = events.send(ClientEvent::ShardStartupComplete { shard_id });
    }

    /// Admits the next shard once the current one finished starting and
    /// announces overall completion when every shard has
    #[allow(clippy::too_many_arguments)]
    fn note_progress(
        &self,
        shard_id: u32,
        shard_ids: &[u32],
        waiting: &mut VecDeque<u32>,
        trackers: &mut HashMap<u32, StartupTracker>,
        started: &mut HashSet<u32>,
        startup_complete: &mut bool,
        pump_tx: &mpsc::UnboundedSender<Pump>,
    ) {
        let is_complete = trackers
            .get(&shard_id)
            .is_some_and(|tracker| tracker.complete);
        if !is_complete || !started.insert(shard_id) {
            return;
        }

        self.admit_next(waiting, trackers, pump_tx);

        if !*startup_complete && started.len() == shard_ids.len() {
            *startup_complete = true;
            info!("all shards started");
            let _ = self.events.send(ClientEvent::StartupComplete);
        }
    }

    /// Uses the configured count, or asks the service for its
    /// recommendation
    async fn resolve_shard_count(&self) -> AppResult<u32> {
        if let Some(count) = self.config.shard_count {
            return Ok(count);
        }

        let response = self
            .api
            .request(ApiRequest::get("gateway/bot").local())
            .await
            .map_err(|err| match err {
                ApiError::Remote(RemoteError::Unavailable(msg)) => {
                    AppError::CoordinationUnavailable(msg)
                }
                other => AppError::Transport(other.to_string()),
            })?;
        if response.status == 401 {
            return Err(AppError::AuthenticationFailed);
        }

        let recommended = response
            .body
            .get("shards")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(1);
        info!(recommended, "using recommended shard count");
        Ok(u32::try_from(recommended).unwrap_or(1))
    }

    /// Periodically drops unreferenced users/presences and idle rate
    /// limit state
    fn start_sweeper(&self) {
        let cache = Arc::clone(&self.cache);
        let api = Arc::clone(&self.api);
        let interval = Duration::from_secs(self.config.startup.cache_sweep_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                cache.sweep();
                api.rate_limit_cache().sweep(interval);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(config: ClientConfig) -> (Client, mpsc::UnboundedReceiver<ClientEvent>) {
        Client::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let config = ClientConfig::new("   ");
        assert!(matches!(
            Client::new(config),
            Err(AppError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_ready_arms_startup_tracker() {
        let (client, mut events) = client(ClientConfig::new("t"));
        let mut trackers = HashMap::new();

        let ready: tether_gateway::ReadyPayload = serde_json::from_str(
            r#"{"session_id": "s", "guilds": [{"id": "5", "unavailable": true}]}"#,
        )
        .unwrap();
        client.handle_shard_event(0, ShardEvent::Ready(ready), &mut trackers, false);

        assert_eq!(trackers.get(&0).unwrap().pending.len(), 1);
        assert!(!trackers.get(&0).unwrap().complete);
        assert!(matches!(
            events.recv().await,
            Some(ClientEvent::ShardReady { guild_count: 1, .. })
        ));
        // the announced guild is cached as a stub immediately
        assert!(client
            .cache
            .with_guild(Snowflake::new(5), |guild| guild.unavailable)
            .unwrap());
    }

    #[tokio::test]
    async fn test_guild_create_drains_startup_and_is_suppressed() {
        let (client, mut events) = client(ClientConfig::new("t"));
        let mut trackers = HashMap::new();

        let ready: tether_gateway::ReadyPayload = serde_json::from_str(
            r#"{"session_id": "s", "guilds": [{"id": "5", "unavailable": true}]}"#,
        )
        .unwrap();
        client.handle_shard_event(0, ShardEvent::Ready(ready), &mut trackers, false);
        let _ = events.recv().await; // ShardReady

        client.handle_shard_event(
            0,
            ShardEvent::Dispatch {
                name: "GUILD_CREATE".to_owned(),
                sequence: Some(2),
                data: serde_json::json!({"id": "5", "name": "g"}),
            },
            &mut trackers,
            false,
        );

        assert!(trackers.get(&0).unwrap().complete);
        // the completion event arrives; the guild-create itself does not
        assert!(matches!(
            events.recv().await,
            Some(ClientEvent::ShardStartupComplete { shard_id: 0 })
        ));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dispatch_suppressed_until_startup_completes() {
        let (client, mut events) = client(ClientConfig::new("t"));
        let mut trackers = HashMap::new();

        client.handle_shard_event(
            0,
            ShardEvent::Dispatch {
                name: "MESSAGE_CREATE".to_owned(),
                sequence: Some(1),
                data: serde_json::json!({"id": "1"}),
            },
            &mut trackers,
            false,
        );
        assert!(events.try_recv().is_err());

        client.handle_shard_event(
            0,
            ShardEvent::Dispatch {
                name: "MESSAGE_CREATE".to_owned(),
                sequence: Some(2),
                data: serde_json::json!({"id": "2"}),
            },
            &mut trackers,
            true,
        );
        assert!(matches!(
            events.recv().await,
            Some(ClientEvent::Dispatch { name, .. }) if name == "MESSAGE_CREATE"
        ));
    }

    #[tokio::test]
    async fn test_event_rename_applied_on_emit() {
        let mut config = ClientConfig::new("t");
        config
            .event_renames
            .insert("MESSAGE_CREATE".to_owned(), "message".to_owned());
        let (client, mut events) = client(config);
        let mut trackers = HashMap::new();

        client.handle_shard_event(
            0,
            ShardEvent::Dispatch {
                name: "MESSAGE_CREATE".to_owned(),
                sequence: Some(1),
                data: serde_json::json!({}),
            },
            &mut trackers,
            true,
        );
        assert!(matches!(
            events.recv().await,
            Some(ClientEvent::Dispatch { name, .. }) if name == "message"
        ));
    }

    #[tokio::test]
    async fn test_resume_counts_as_started() {
        let (client, mut events) = client(ClientConfig::new("t"));
        let mut trackers = HashMap::new();

        client.handle_shard_event(0, ShardEvent::Resumed, &mut trackers, false);
        assert!(trackers.get(&0).unwrap().complete);
        assert!(matches!(
            events.recv().await,
            Some(ClientEvent::ShardStartupComplete { shard_id: 0 })
        ));
        assert!(matches!(
            events.recv().await,
            Some(ClientEvent::ShardResumed { shard_id: 0 })
        ));
    }
}
