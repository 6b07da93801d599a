//! End-to-end client tests against a scripted API and gateway socket

use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::timeout;

use integration_tests::{CannedResponse, MockApi, MockGateway};
use tether_client::{Client, ClientEvent};
use tether_common::config::ClientConfig;

const WAIT: Duration = Duration::from_secs(10);

async fn next_event(events: &mut mpsc::UnboundedReceiver<ClientEvent>) -> ClientEvent {
    timeout(WAIT, events.recv())
        .await
        .expect("event timed out")
        .expect("event channel closed")
}

fn test_config(base_url: &str, shard_count: u32) -> ClientConfig {
    let mut config = ClientConfig::new("test-token");
    config.shard_count = Some(shard_count);
    config.rest.base_url = base_url.to_owned();
    // the mock socket takes no query parameters
    config.gateway.ws_params = String::new();
    config.gateway.login_gate_buffer_ms = 50;
    config
}

#[tokio::test]
async fn test_shards_start_one_at_a_time() {
    let gateway = MockGateway::new();
    gateway.announce_guilds(&[101, 102]);
    let (ws_url, _gw) = gateway.serve().await;

    let mock = MockApi::new();
    mock.set_default(CannedResponse::ok(json!({"url": ws_url, "shards": 2})));
    let (base_url, _api) = mock.serve().await;

    let (client, mut events) = Client::new(test_config(&base_url, 2)).expect("client");
    let _runner = tokio::spawn(client.run());

    // shard 0 identifies, lists its guilds, and drains them
    assert!(matches!(
        next_event(&mut events).await,
        ClientEvent::ShardReady { shard_id: 0, guild_count: 2 }
    ));
    assert!(matches!(
        next_event(&mut events).await,
        ClientEvent::ShardStartupComplete { shard_id: 0 }
    ));
    assert_eq!(gateway.identify_count(), 1);

    // only then is shard 1 admitted
    assert!(matches!(
        next_event(&mut events).await,
        ClientEvent::ShardReady { shard_id: 1, guild_count: 2 }
    ));
    assert!(matches!(
        next_event(&mut events).await,
        ClientEvent::ShardStartupComplete { shard_id: 1 }
    ));
    assert!(matches!(
        next_event(&mut events).await,
        ClientEvent::StartupComplete
    ));
    assert_eq!(gateway.identify_count(), 2);
}

#[tokio::test]
async fn test_startup_guild_creates_populate_the_cache() {
    let gateway = MockGateway::new();
    gateway.announce_guilds(&[7]);
    let (ws_url, _gw) = gateway.serve().await;

    let mock = MockApi::new();
    mock.set_default(CannedResponse::ok(json!({"url": ws_url})));
    let (base_url, _api) = mock.serve().await;

    let (client, mut events) = Client::new(test_config(&base_url, 1)).expect("client");
    let cache = std::sync::Arc::clone(client.cache());
    let _runner = tokio::spawn(client.run());

    loop {
        if matches!(next_event(&mut events).await, ClientEvent::StartupComplete) {
            break;
        }
    }

    // the announced guild arrived and is no longer a stub
    assert_eq!(cache.guild_count(), 1);
    assert_eq!(
        cache
            .with_guild(tether_core::Snowflake::new(7), |guild| guild.unavailable),
        Some(false)
    );
}

#[tokio::test]
async fn test_events_flow_after_startup() {
    let gateway = MockGateway::new();
    gateway.announce_guilds(&[42]);
    let (ws_url, _gw) = gateway.serve().await;

    let mock = MockApi::new();
    mock.set_default(CannedResponse::ok(json!({"url": ws_url})));
    let (base_url, _api) = mock.serve().await;

    let mut config = test_config(&base_url, 1);
    config.startup.emit_guild_creates_during_startup = true;

    let (client, mut events) = Client::new(config).expect("client");
    let _runner = tokio::spawn(client.run());

    // guild creates pass through when configured to
    loop {
        match next_event(&mut events).await {
            ClientEvent::Dispatch { name, data, .. } => {
                assert_eq!(name, "GUILD_CREATE");
                assert_eq!(data.get("id").and_then(|v| v.as_str()), Some("42"));
                break;
            }
            ClientEvent::StartupComplete => panic!("guild create was not emitted"),
            _ => {}
        }
    }
}
