//! Store-and-forward mail relay
//!
//! Usage:
//!   mail_relay --config config/mail_relay.toml
//!   mail_relay --port 5945 --delivery-interval 30
//!
//! Operator commands are read from stdin (`list`, `help`); closing stdin
//! stops the relay.

use anyhow::Result;
use clap::Parser;
use mail_relays::config::RelayConfig;
use mail_relays::core::{bind, Multiplexer};
use mail_relays::{init_logging, Overrides};
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "mail_relay")]
#[command(about = "Store-and-forward mail relay server")]
#[command(version)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// TCP port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind the listener to
    #[arg(long)]
    bind: Option<String>,

    /// Seconds between delivery passes
    #[arg(long)]
    delivery_interval: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging format
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.json_logs)?;

    info!("🚀 Starting mail relay");
    if let Some(path) = &args.config {
        info!("Configuration: {}", path.display());
    }

    let mut config = RelayConfig::load(args.config.as_deref()).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    Overrides {
        bind_address: args.bind,
        port: args.port,
        delivery_interval_secs: args.delivery_interval,
    }
    .apply(&mut config);
    config.validate().map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;

    info!(
        "Delivery every {}s, at most {} pending mails",
        config.delivery.interval_secs, config.delivery.max_pending
    );

    let listener = bind(&config).await.map_err(|e| {
        error!("Failed to start listener: {}", e);
        e
    })?;

    let mut relay = Multiplexer::new(config);
    let console = BufReader::new(tokio::io::stdin());

    tokio::select! {
        result = relay.run(listener, console) => {
            if let Err(e) = &result {
                error!("Relay failed: {}", e);
            }
            result?;
            info!("Console closed, shutting down");
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Received shutdown signal");
        }
    }

    Ok(())
}
