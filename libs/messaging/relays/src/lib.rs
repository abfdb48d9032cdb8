//! Mail relay binaries support: shared logging setup and command-line
//! overrides layered on top of the loaded `RelayConfig`.

pub use codec;
pub use network;
pub use relay_config as config;
pub use relay_core as core;

use relay_config::RelayConfig;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `level` is used as the filter.
/// Logs go to stderr so stdout stays free for console and mail output.
pub fn init_logging(level: &str, json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))
}

/// Settings given on the command line, applied after file and environment
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub delivery_interval_secs: Option<u64>,
}

impl Overrides {
    pub fn apply(&self, config: &mut RelayConfig) {
        if let Some(bind) = &self.bind_address {
            config.server.bind_address = bind.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(secs) = self.delivery_interval_secs {
            config.delivery.interval_secs = secs;
        }
    }
}
