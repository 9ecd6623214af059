//! # Beacon Node
//!
//! Loads configuration from the environment, starts the runtime and serves
//! the HTTP surface until Ctrl+C.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use beacon_telemetry::{init_logging, TelemetryConfig};
use clap::Parser;
use node_runtime::{load_config, NodeRuntime};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "beacon-node", version, about = "Beacon benchmark job node")]
struct Args {
    /// Listen address, overrides BEACON_HTTP_ADDR.
    #[arg(long)]
    http_addr: Option<SocketAddr>,

    /// Durable outbox directory, overrides BEACON_DATA_DIR.
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&TelemetryConfig::from_env()).context("initializing logging")?;

    let mut config = load_config().context("loading configuration")?;
    if let Some(addr) = args.http_addr {
        config.server.http_addr = addr;
    }
    if args.data_dir.is_some() {
        config.server.data_dir = args.data_dir;
    }
    let addr = config.server.http_addr;

    let mut runtime = NodeRuntime::new(config).context("building node runtime")?;
    runtime.start();

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "Node is running. Press Ctrl+C to stop.");

    let hub = runtime.hub().clone();
    axum::serve(listener, runtime.router())
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            // Observer sockets never finish on their own.
            hub.shutdown().await;
        })
        .await
        .context("serving HTTP")?;

    runtime.shutdown().await;
    Ok(())
}
