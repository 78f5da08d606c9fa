use anyhow::Context;
use clap::Parser;
use dynamo_kv::api;
use dynamo_kv::config::ClusterConfig;
use dynamo_kv::dynamo::engine::Dynamo;
use dynamo_kv::membership::types::NodeId;
use dynamo_kv::ring::partitioner::Ring;
use dynamo_kv::storage::memory::MemoryStore;
use dynamo_kv::transport::tcp::{self, TcpTransport};
use dynamo_kv::transport::MessageHandler;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Offset from the peer port to the client HTTP port.
const HTTP_PORT_OFFSET: u16 = 1000;

#[derive(Parser, Debug)]
#[command(name = "dynamo-node", about = "Replicated key-value store node")]
struct Cli {
    /// Peer port of this node; must be one of the configured members
    #[arg(short, long)]
    port: u16,

    /// JSON cluster configuration (defaults to the built-in five-node ring)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Client HTTP port (defaults to the peer port + 1000)
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    // 1. Configuration:
    let config = match &cli.config {
        Some(path) => ClusterConfig::load(path)?,
        None => ClusterConfig::default(),
    };
    let node = NodeId(cli.port);
    config.validate_member(node)?;

    tracing::info!("Starting node {} of {:?}", node, config.members);

    // 2. Ring and local state:
    let ring = Ring::new(config.node_ids(), config.replication)?;
    tracing::info!("Ring: {:?}", ring);

    let store = MemoryStore::new();
    let transport = TcpTransport::new(config.host, config.timeouts.connect_timeout());
    let dynamo = Dynamo::new(node, ring, store, transport, config.timeouts.clone());

    // 3. Peer listener must be up before recovery asks anyone for data:
    let peer_addr = node.socket_addr(config.host);
    let listener = tokio::net::TcpListener::bind(peer_addr)
        .await
        .with_context(|| format!("binding peer listener on {}", peer_addr))?;
    let handler: Arc<dyn MessageHandler> = dynamo.clone();
    let read_timeout = config.timeouts.read_timeout();
    tokio::spawn(async move {
        if let Err(e) = tcp::serve(listener, handler, read_timeout).await {
            tracing::error!("Peer listener stopped: {}", e);
        }
    });

    // 4. Recovery:
    dynamo.start().await?;

    // 5. Spawn stats reporter:
    let stats = dynamo.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        loop {
            interval.tick().await;
            let offline = stats.liveness().offline_nodes();
            match stats.local_row_count() {
                Ok(rows) => tracing::info!(
                    "Node stats: {} local rows, {:?} recovery, offline peers {:?}",
                    rows,
                    stats.recovery_state(),
                    offline
                ),
                Err(e) => tracing::warn!("Failed to count local rows: {}", e),
            }
        }
    });

    // 6. Start HTTP server:
    let http_port = match cli.http_port {
        Some(port) => port,
        None => node
            .0
            .checked_add(HTTP_PORT_OFFSET)
            .context("peer port too high to derive the HTTP port; pass --http-port")?,
    };
    let http_addr = SocketAddr::new(config.host, http_port);

    tracing::info!("HTTP server listening on {}", http_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    axum::serve(listener, api::router(dynamo)).await?;

    Ok(())
}
