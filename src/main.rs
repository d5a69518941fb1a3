// socialpulse server binary.
// Parses flags, sets up logging, loads configuration and serves until Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use socialpulse::cache::MemoryStore;
use socialpulse::{Config, Result, server};

#[derive(Parser, Debug)]
#[command(name = "socialpulse")]
#[command(version, about = "Cached social activity API for a link-hub page")]
struct Args {
    /// Host to bind to (overrides config and SOCIALPULSE_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides config and SOCIALPULSE_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if config.upstream.github_token.is_none() {
        warn!("GITHUB_TOKEN not set; GitHub requests use the anonymous rate limit");
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        timeout_secs = config.upstream.timeout_secs,
        "Starting socialpulse"
    );

    let store = Arc::new(MemoryStore::new());
    server::start_server(&config, store, shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
