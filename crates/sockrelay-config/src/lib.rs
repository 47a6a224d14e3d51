#![deny(unsafe_code)]

//! Configuration loading and validation for SockRelay.
//!
//! Loads TOML configuration files and validates them. Provides the
//! [`AppConfig`] type as the central configuration structure shared by the
//! client library and the CLI.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default directory scanned for instance subdirectories.
pub const DEFAULT_SOCKETS_ROOT: &str = "/tmp/idproxy_sockets";

/// Default socket file name expected inside each instance subdirectory.
pub const DEFAULT_SOCKET_NAME: &str = "idproxy.sock";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where instance sockets live on disk.
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Per-attempt connection settings.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Socket discovery configuration.
///
/// Instances are expected at `<sockets_root>/<instance-id>/<socket_name>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Directory holding one subdirectory per instance. Kept as a path so
    /// non-UTF-8 roots from the command line survive unchanged.
    #[serde(default = "default_sockets_root")]
    pub sockets_root: PathBuf,

    /// Socket file name inside each instance subdirectory.
    #[serde(default = "default_socket_name")]
    pub socket_name: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            sockets_root: default_sockets_root(),
            socket_name: default_socket_name(),
        }
    }
}

fn default_sockets_root() -> PathBuf {
    PathBuf::from(DEFAULT_SOCKETS_ROOT)
}

fn default_socket_name() -> String {
    DEFAULT_SOCKET_NAME.to_string()
}

/// Transport configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Upper bound on dialing a single socket, in milliseconds.
    ///
    /// Unset means the dial waits as long as the OS lets it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_ms: Option<u64>,
}

impl TransportConfig {
    /// The connect timeout as a [`Duration`], if configured.
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.discovery.sockets_root.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "discovery.sockets_root must not be empty".to_string(),
            ));
        }
        if self.discovery.socket_name.is_empty() {
            return Err(ConfigError::Validation(
                "discovery.socket_name must not be empty".to_string(),
            ));
        }
        if self.discovery.socket_name.contains('/') {
            return Err(ConfigError::Validation(format!(
                "discovery.socket_name must be a bare file name, got {:?}",
                self.discovery.socket_name
            )));
        }
        if self.transport.connect_timeout_ms == Some(0) {
            return Err(ConfigError::Validation(
                "transport.connect_timeout_ms must be non-zero when set".to_string(),
            ));
        }
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                VALID_LOG_LEVELS, self.logging.level
            )));
        }
        Ok(())
    }
}
