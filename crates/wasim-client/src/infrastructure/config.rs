//! TOML configuration for a client session.
//!
//! # Example (for beginners)
//!
//! ```toml
//! [client]
//! client_id = 0x57415343   # TOML accepts hex integers
//! name = "MyPanel"
//!
//! [network]
//! timeout_ms = 2000
//! server_address = "127.0.0.1:4020"
//!
//! [logging]
//! console_level = "debug"
//! client_remote_level = "Warning"
//! server_remote_level = "Info"
//! ```
//!
//! Every field has a default, so a missing file, a missing section or a
//! missing key all fall back to working values.  [`ClientConfig`] converts
//! into the [`SessionSettings`] a [`Session`](crate::application::session::Session)
//! is built from; the application layer never reads TOML itself.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wasim_core::LogLevel;

use crate::application::session::{LogLevels, SessionSettings, DEFAULT_CLIENT_ID};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub network: NetworkSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Identity of this client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientSection {
    /// Non-zero id, unique among the clients of one module.
    #[serde(default = "default_client_id")]
    pub client_id: u32,
    /// Name announced to the simulator host.
    #[serde(default = "default_client_name")]
    pub name: String,
}

/// Connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkSection {
    /// Default timeout of synchronous operations in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// `host:port` of the simulator host's bridge.
    #[serde(default = "default_server_address")]
    pub server_address: String,
}

/// Log levels for this process and for the module.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing` filter for this process, e.g. `"info"` or `"wasim_client=debug"`.
    /// `RUST_LOG` overrides it.
    #[serde(default = "default_console_level")]
    pub console_level: String,
    /// Client records at or above this level go to log observers.
    #[serde(default = "default_client_remote_level")]
    pub client_remote_level: LogLevel,
    /// Level of module records forwarded to this client.
    #[serde(default = "default_server_remote_level")]
    pub server_remote_level: LogLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_console_level: Option<LogLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_file_level: Option<LogLevel>,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_client_id() -> u32 {
    DEFAULT_CLIENT_ID
}
fn default_client_name() -> String {
    "WASimClient".to_string()
}
fn default_timeout_ms() -> u64 {
    1000
}
fn default_server_address() -> String {
    "127.0.0.1:4020".to_string()
}
fn default_console_level() -> String {
    "info".to_string()
}
fn default_client_remote_level() -> LogLevel {
    LogLevel::Info
}
fn default_server_remote_level() -> LogLevel {
    LogLevel::None
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            client_id: default_client_id(),
            name: default_client_name(),
        }
    }
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            server_address: default_server_address(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            console_level: default_console_level(),
            client_remote_level: default_client_remote_level(),
            server_remote_level: default_server_remote_level(),
            server_console_level: None,
            server_file_level: None,
        }
    }
}

impl From<&ClientConfig> for SessionSettings {
    fn from(config: &ClientConfig) -> Self {
        SessionSettings {
            client_id: config.client.client_id,
            client_name: config.client.name.clone(),
            default_timeout: Duration::from_millis(config.network.timeout_ms),
            log_levels: LogLevels {
                client_remote: config.logging.client_remote_level,
                server_remote: config.logging.server_remote_level,
                server_console: config.logging.server_console_level,
                server_file: config.logging.server_file_level,
            },
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Loads a [`ClientConfig`] from `path`, returning the defaults if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ClientConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &ClientConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
