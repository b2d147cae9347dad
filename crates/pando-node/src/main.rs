//! Pando overlay node binary
//!
//! This is the main entry point for running a Pando node.

mod cli;

use anyhow::Result;
use cli::Cli;
use pando_net::{Network, NetworkConfig, StaticAnswer};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    tracing::info!("Pando node starting...");

    let bootstrap_peers = cli.bootstrap_peers();
    let expected_peers = bootstrap_peers.len();

    let config = NetworkConfig {
        listen_addr: cli.listen,
        bootstrap_peers,
        ..Default::default()
    };

    let network = Network::new(config, Arc::new(StaticAnswer::new(cli.answer)));
    network.start().await?;
    tracing::info!("Node address: {}", network.address());

    if let Some(query) = cli.ask {
        // Let the bootstrap dials land before asking
        wait_for_peers(&network, expected_peers, Duration::from_secs(3)).await;

        let answers = network
            .broadcast_query(&query, Duration::from_secs(cli.ask_timeout))
            .await;
        println!("{}", serde_json::to_string_pretty(&answers)?);

        network.stop();
        return Ok(());
    }

    // Serve until interrupted
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    network.stop();

    tracing::info!("Pando node stopped");

    Ok(())
}

/// Wait until `expected` peers are connected, up to `deadline` from now
async fn wait_for_peers(network: &Network, expected: usize, deadline: Duration) {
    let end = Instant::now() + deadline;
    while network.peer_count() < expected && Instant::now() < end {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
