//! Client runner entry point
//!
//! Run with:
//! ```bash
//! cargo run -p tether-client -- [config-file]
//! ```
//!
//! Configuration is loaded from the optional file argument layered with
//! `TETHER_`-prefixed environment variables.

use tether_client::{Client, ClientEvent};
use tether_common::{try_init_tracing, ClientConfig};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    if let Err(e) = try_init_tracing() {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run().await {
        error!(error = %e, "Client stopped");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting client...");

    let config_path = std::env::args().nth(1);
    let config = ClientConfig::load(config_path.as_deref()).map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    info!(
        shards = ?config.shards,
        shard_count = ?config.shard_count,
        locks = config.identify_locks.len(),
        "Configuration loaded"
    );

    let (client, mut events) = Client::new(config)?;

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ClientEvent::ShardReady {
                    shard_id,
                    guild_count,
                } => info!(shard_id, guild_count, "shard ready"),
                ClientEvent::ShardResumed { shard_id } => info!(shard_id, "shard resumed"),
                ClientEvent::ShardStartupComplete { shard_id } => {
                    info!(shard_id, "shard startup complete");
                }
                ClientEvent::StartupComplete => info!("all shards started"),
                ClientEvent::GatewayClosed {
                    shard_id,
                    code,
                    disposition,
                } => warn!(shard_id, code, ?disposition, "gateway closed"),
                ClientEvent::Dispatch { shard_id, name, .. } => {
                    info!(shard_id, event = %name, "dispatch");
                }
            }
        }
    });

    client.run().await?;
    Ok(())
}
