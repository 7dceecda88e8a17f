//! `beacond`: the Beacon service discovery daemon.
//!
//! Binary entrypoint that wires the registry, the membership event bus and
//! the discovery HTTP API into a running node.
//!
//! # Usage
//!
//! ```text
//! beacond start                              # serve on the default address
//! beacond start -c beacon.toml               # start with a config file
//! beacond start -l 127.0.0.1:8500 -r 128     # override listen address and R
//! beacond ring --type worker                 # print the worker ring layout
//! beacond ring --type worker --key user-42   # which worker owns a key
//! ```

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use beacon_api::{DiscoveryServer, DiscoveryServerConfig};
use beacon_registry::{EventAdapter, MemberKey, Registry, listener};
use beacon_types::{ClusterEvent, EventBus, MemberEventKind, PeerType};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use config::CliConfig;

// -----------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "beacond", version, about = "Beacon service discovery daemon")]
struct Cli {
    /// Path to TOML config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the registry replication factor (virtual nodes per address).
    #[arg(short, long, global = true, env = "BEACON_REPLICATION_FACTOR")]
    replication_factor: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the discovery daemon.
    Start {
        /// Override HTTP listen address (e.g. "127.0.0.1:8500").
        #[arg(short, long)]
        listen_addr: Option<String>,
    },

    /// Print the ring of one type, built from the configured members.
    Ring {
        /// The type to inspect.
        #[arg(short = 't', long = "type")]
        kind: String,

        /// Print only the address owning this key.
        #[arg(short, long)]
        key: Option<String>,
    },
}

// -----------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = CliConfig::load(cli.config.as_deref()).context("failed to load config")?;

    setup_tracing(&config.log.level);

    // CLI args override config file values.
    if let Some(r) = cli.replication_factor {
        config.registry.replication_factor = r;
    }

    match cli.command {
        Commands::Start { listen_addr } => {
            if let Some(addr) = listen_addr {
                config.node.listen_addr = addr;
            }
            cmd_start(config).await
        }
        Commands::Ring { kind, key } => cmd_ring(&config, &kind, key.as_deref()),
    }
}

/// Initialize the `tracing` subscriber with the given level filter.
///
/// Respects `RUST_LOG` env var if set, otherwise uses the config value.
fn setup_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// -----------------------------------------------------------------------
// beacond start
// -----------------------------------------------------------------------

async fn cmd_start(config: CliConfig) -> Result<()> {
    let replication_factor = config.replication_factor()?;
    let peers = config.peers()?;

    info!("starting beacond");
    info!(
        listen_addr = %config.node.listen_addr,
        replication_factor = replication_factor.get(),
        static_members = peers.len(),
        "node configuration"
    );

    let registry = Arc::new(Registry::with_default_hash(replication_factor));
    let bus = EventBus::new();
    let listener = listener::start(
        Arc::new(EventAdapter::new(registry.clone())),
        bus.subscribe(),
    );

    if !peers.is_empty() {
        bus.emit(ClusterEvent::member(MemberEventKind::Joined, peers));
    }

    let server = DiscoveryServer::new(DiscoveryServerConfig {
        registry: registry.clone(),
    });
    let result = server
        .serve_with_shutdown(&config.node.listen_addr, shutdown_signal())
        .await
        .with_context(|| format!("discovery API on {} failed", config.node.listen_addr));

    listener.stop().await;
    info!(?registry, "beacond stopped");
    result
}

/// Resolve when the process receives Ctrl-C.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received ctrl-c, shutting down"),
        Err(e) => warn!("failed to listen for ctrl-c: {e}"),
    }
}

// -----------------------------------------------------------------------
// beacond ring
// -----------------------------------------------------------------------

fn cmd_ring(config: &CliConfig, kind: &str, key: Option<&str>) -> Result<()> {
    let peer_type = PeerType::parse(kind)?;
    let registry = Registry::with_default_hash(config.replication_factor()?);
    for peer in config.peers()? {
        registry.add(&MemberKey::new(&peer));
    }

    if let Some(key) = key {
        let owner = registry
            .locate(peer_type.as_str(), key)
            .with_context(|| format!("no members of type {peer_type}"))?;
        println!("{owner}");
        return Ok(());
    }

    let info = registry
        .info(peer_type.as_str())
        .with_context(|| format!("no members of type {peer_type}"))?;

    println!(
        "type {}: {} addresses, {} virtual nodes",
        info.category,
        info.addresses().len(),
        info.hashes.len()
    );
    for vnode in &info.hashes {
        println!("  {:>10}  {}", vnode.hash, vnode.address);
    }
    for (address, entries) in &info.keys {
        println!("{address}");
        for entry in entries {
            let tags: Vec<String> = entry.tags.iter().map(|(k, v)| format!("{k}={v}")).collect();
            println!("  {}  {}", entry.name, tags.join(","));
        }
    }
    Ok(())
}
