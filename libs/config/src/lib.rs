//! # Relay Configuration Management
//!
//! ## Purpose
//!
//! Typed configuration for the mail relay with defaults that match the wire
//! protocol, optional TOML files and environment overrides.
//!
//! ## Configuration Structure
//!
//! ### 1. ServerSettings - Listener
//! ```toml
//! [server]
//! bind_address = "0.0.0.0"
//! port = 5945
//! banner = "Welcome to the mail relay, running on port 5945."
//! max_connections = 1024
//! ```
//!
//! ### 2. DeliverySettings - Scheduler and Queue
//! ```toml
//! [delivery]
//! interval_secs = 30      # Drain pass period
//! max_pending = 10000     # Queued mail ceiling
//! ```
//!
//! ### 3. LimitSettings - Per-Connection Protection
//! ```toml
//! [limits]
//! max_frame_size = 2048          # Larger declared lengths close the connection
//! max_body_chars = 80
//! frame_read_timeout_ms = 10000  # Budget for a started frame
//! outbound_queue_size = 64       # Frames buffered per client
//! ```
//!
//! ## Loading Order
//!
//! `RelayConfig::load` layers, lowest priority first:
//! 1. Built-in defaults
//! 2. Optional TOML file
//! 3. Environment variables `MAIL_RELAY__<SECTION>__<KEY>`
//!    (for example `MAIL_RELAY__SERVER__PORT=6000`)
//!
//! Sections and keys missing from a file keep their defaults.

use codec::{DEFAULT_MAX_FRAME_SIZE, DEFAULT_PORT, MAX_BODY_CHARS, MAX_CONFIGURABLE_FRAME_SIZE};
use config::{Config, Environment, File, FileFormat, Map};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "MAIL_RELAY";

/// Separator between prefix, section and key in environment variables
pub const ENV_SEPARATOR: &str = "__";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Layered loading or deserialization failed
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of its accepted range
    #[error("Invalid configuration: {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

impl ConfigError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

/// Main relay configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    pub server: ServerSettings,
    pub delivery: DeliverySettings,
    pub limits: LimitSettings,
}

/// Listener settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Interface to bind; `0.0.0.0` for all
    pub bind_address: String,
    pub port: u16,
    /// Text of the WELCOME frame; derived from the port when unset
    pub banner: Option<String>,
    /// Live connections accepted before new ones are turned away
    pub max_connections: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            banner: None,
            max_connections: 1024,
        }
    }
}

/// Delivery scheduler settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DeliverySettings {
    pub interval_secs: u64,
    pub max_pending: usize,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            max_pending: 10_000,
        }
    }
}

/// Per-connection limits
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitSettings {
    pub max_frame_size: usize,
    pub max_body_chars: usize,
    pub frame_read_timeout_ms: u64,
    pub outbound_queue_size: usize,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_body_chars: MAX_BODY_CHARS,
            frame_read_timeout_ms: 10_000,
            outbound_queue_size: 64,
        }
    }
}

impl RelayConfig {
    /// Load defaults, an optional TOML file, then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, None)
    }

    /// Like [`RelayConfig::load`], reading overrides from `env` instead of the
    /// process environment when given
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&RelayConfig::default())?);

        if let Some(path) = path {
            info!("Loading relay config: {:?}", path);
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .source(env),
        );

        let config: RelayConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        debug!(?config, "Relay configuration loaded");
        Ok(config)
    }

    /// Load configuration from a TOML file alone
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: RelayConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value is in its accepted range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::invalid("server.port", "must be non-zero"));
        }
        if self.server.bind_address.trim().is_empty() {
            return Err(ConfigError::invalid("server.bind_address", "must not be empty"));
        }
        if self.server.max_connections == 0 {
            return Err(ConfigError::invalid("server.max_connections", "must be non-zero"));
        }
        if self.delivery.interval_secs == 0 {
            return Err(ConfigError::invalid("delivery.interval_secs", "must be non-zero"));
        }
        if self.delivery.max_pending == 0 {
            return Err(ConfigError::invalid("delivery.max_pending", "must be non-zero"));
        }

        let frame = self.limits.max_frame_size;
        if !(codec::FRAME_HEADER_SIZE..=MAX_CONFIGURABLE_FRAME_SIZE).contains(&frame) {
            return Err(ConfigError::invalid(
                "limits.max_frame_size",
                format!(
                    "{} outside {}..={}",
                    frame,
                    codec::FRAME_HEADER_SIZE,
                    MAX_CONFIGURABLE_FRAME_SIZE
                ),
            ));
        }
        if self.limits.max_body_chars == 0 {
            return Err(ConfigError::invalid("limits.max_body_chars", "must be non-zero"));
        }
        if self.limits.frame_read_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "limits.frame_read_timeout_ms",
                "must be non-zero",
            ));
        }
        if self.limits.outbound_queue_size == 0 {
            return Err(ConfigError::invalid(
                "limits.outbound_queue_size",
                "must be non-zero",
            ));
        }
        Ok(())
    }

    /// Listen address as `host:port`
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }

    /// Banner text, defaulting to one naming the configured port
    pub fn banner(&self) -> String {
        self.server
            .banner
            .clone()
            .unwrap_or_else(|| codec::default_banner(self.server.port))
    }

    pub fn delivery_interval(&self) -> Duration {
        Duration::from_secs(self.delivery.interval_secs)
    }

    pub fn frame_read_timeout(&self) -> Duration {
        Duration::from_millis(self.limits.frame_read_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.server.port, 5945);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.delivery.interval_secs, 30);
        assert_eq!(config.limits.max_frame_size, 2048);
        assert_eq!(config.limits.max_body_chars, 80);
        assert_eq!(config.listen_address(), "0.0.0.0:5945");
        assert_eq!(config.banner(), "Welcome to the mail relay, running on port 5945.");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = RelayConfig::load_with_env(None, Some(Map::new())).unwrap();
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let file = write_config(
            r#"
            [server]
            port = 6000

            [delivery]
            interval_secs = 5
            "#,
        );

        let config = RelayConfig::load_with_env(Some(file.path()), Some(Map::new())).unwrap();
        assert_eq!(config.server.port, 6000);
        assert_eq!(config.delivery.interval_secs, 5);
        assert_eq!(config.delivery.max_pending, 10_000);
        assert_eq!(config.limits, LimitSettings::default());
        assert_eq!(config.banner(), "Welcome to the mail relay, running on port 6000.");
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = write_config("[server]\nport = 6000\n");

        let mut env = Map::new();
        env.insert("MAIL_RELAY__SERVER__PORT".to_string(), "7000".to_string());
        env.insert(
            "MAIL_RELAY__LIMITS__MAX_BODY_CHARS".to_string(),
            "120".to_string(),
        );

        let config = RelayConfig::load_with_env(Some(file.path()), Some(env)).unwrap();
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.limits.max_body_chars, 120);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(matches!(
            RelayConfig::load_with_env(Some(&missing), Some(Map::new())),
            Err(ConfigError::Load(_))
        ));
        assert!(matches!(
            RelayConfig::from_file(&missing),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_from_file() {
        let file = write_config(
            r#"
            [server]
            bind_address = "127.0.0.1"
            banner = "hello"

            [limits]
            outbound_queue_size = 8
            "#,
        );

        let config = RelayConfig::from_file(file.path()).unwrap();
        assert_eq!(config.listen_address(), "127.0.0.1:5945");
        assert_eq!(config.banner(), "hello");
        assert_eq!(config.limits.outbound_queue_size, 8);
    }

    #[test]
    fn test_from_file_rejects_bad_toml() {
        let file = write_config("[server\nport = ");
        assert!(matches!(
            RelayConfig::from_file(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_validation() {
        let mut config = RelayConfig::default();
        config.server.port = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "server.port", .. })
        ));

        let mut config = RelayConfig::default();
        config.delivery.interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.limits.max_frame_size = 4;
        assert!(config.validate().is_err());
        config.limits.max_frame_size = MAX_CONFIGURABLE_FRAME_SIZE + 1;
        assert!(config.validate().is_err());
        config.limits.max_frame_size = MAX_CONFIGURABLE_FRAME_SIZE;
        assert!(config.validate().is_ok());

        let mut config = RelayConfig::default();
        config.limits.max_body_chars = 0;
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.limits.outbound_queue_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_durations() {
        let config = RelayConfig::default();
        assert_eq!(config.delivery_interval(), Duration::from_secs(30));
        assert_eq!(config.frame_read_timeout(), Duration::from_secs(10));
    }
}
