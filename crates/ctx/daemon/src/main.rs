//! ctxd - Context Discovery daemon
//!
//! Runs one discoverer:
//! - Registration, queries and subscriptions over TCP
//! - Discoverer lookups over the multicast group
//! - Lease expiry with the lease-end handshake
//! - Optional registration log replayed at startup

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use clap::Parser;
use ctx_daemon::{DaemonConfig, DaemonError, DaemonResult, Server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Context Discovery daemon CLI
#[derive(Parser)]
#[command(name = "ctxd")]
#[command(about = "Context Discovery daemon - component discovery and subscriptions", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CTXD_CONFIG")]
    config: Option<String>,

    /// Listen address, overrides the configuration file
    #[arg(short, long, env = "CTXD_LISTEN_ADDR")]
    listen: Option<String>,

    /// Discoverer id
    #[arg(long, env = "CTXD_ID")]
    id: Option<String>,

    /// Registration log path
    #[arg(long, env = "CTXD_DISCOVERY_LOG")]
    discovery_log: Option<PathBuf>,

    /// Log level
    #[arg(long, env = "CTXD_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "CTXD_LOG_JSON")]
    json: bool,

    /// Also write logs to this file
    #[arg(long, env = "CTXD_LOG_FILE")]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    init_tracing(&cli)?;

    // Load configuration
    let mut config = DaemonConfig::load(cli.config.as_deref())
        .map_err(|e| DaemonError::Config(e.to_string()))?;

    // Override with CLI args
    if let Some(listen) = &cli.listen {
        let addr = listen
            .parse()
            .map_err(|e| DaemonError::Config(format!("Invalid listen address: {}", e)))?;
        config.listen_on(addr);
    }
    if let Some(id) = cli.id {
        config.discovery.id = id;
    }
    if let Some(path) = cli.discovery_log {
        config.discovery.log_path = Some(path);
    }

    println!(
        r#"
  Context Discovery daemon
  Version: {}
  Discoverer: {}
  Listening: {}
"#,
        env!("CARGO_PKG_VERSION"),
        config.discovery.id,
        config.server.listen_addr
    );

    let server = Server::new(config).await?;
    server.run().await
}

fn init_tracing(cli: &Cli) -> DaemonResult<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());

    let file_layer = match &cli.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    Ok(())
}
