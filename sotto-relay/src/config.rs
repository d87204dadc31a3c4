//! Configuration loading for sotto-relay.
//!
//! Configuration is loaded from a TOML file (default: `relay.toml`).

use serde::Deserialize;
use std::path::PathBuf;

/// Root configuration for sotto-relay.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Session and rate limiting configuration.
    pub limits: LimitsConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the WebSocket/HTTP server (default: 127.0.0.1:9440).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

/// Session and rate limiting configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum concurrent sessions (default: 10000).
    /// New connections are refused once this many sessions are live.
    #[serde(default = "default_max_concurrent_sessions")]
    pub max_concurrent_sessions: usize,
    /// Maximum frame size in bytes (default: 1MB).
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
    /// Maximum recipients in a single relay frame (default: 64).
    #[serde(default = "default_max_recipients")]
    pub max_recipients: usize,
    /// Maximum identifier length in bytes (default: 128).
    #[serde(default = "default_max_identifier_len")]
    pub max_identifier_len: usize,
    /// Timeout in seconds for receiving JOIN after connection (default: 10).
    /// Connections that don't send JOIN within this time are dropped.
    #[serde(default = "default_join_timeout_secs")]
    pub join_timeout_secs: u64,
    /// Seconds a session may stay silent before eviction (default: 300).
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Timeout in seconds for a single outbound socket write (default: 10).
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
    /// Outbound queue depth per session (default: 64).
    /// Frames beyond this are dropped rather than stalling the sender.
    #[serde(default = "default_send_queue_depth")]
    pub send_queue_depth: usize,
    /// Dropped frames tolerated before a slow session is evicted (default: 100).
    #[serde(default = "default_max_send_drops")]
    pub max_send_drops: u64,
    /// Maximum connection attempts per IP per minute (default: 60).
    #[serde(default = "default_connections_per_minute_per_ip")]
    pub connections_per_minute_per_ip: u32,
    /// Maximum relay frames per participant per second (default: 200).
    #[serde(default = "default_messages_per_second")]
    pub messages_per_second: u32,
    /// Maximum relay frames per second across all sessions (default: 10000).
    #[serde(default = "default_global_messages_per_second")]
    pub global_messages_per_second: u32,
}

// Default value functions
fn default_bind_address() -> String {
    "127.0.0.1:9440".to_string()
}

fn default_max_concurrent_sessions() -> usize {
    10_000
}

fn default_max_frame_size() -> usize {
    1024 * 1024 // 1MB
}

fn default_max_recipients() -> usize {
    64
}

fn default_max_identifier_len() -> usize {
    128
}

fn default_join_timeout_secs() -> u64 {
    10
}

fn default_idle_timeout_secs() -> u64 {
    300 // 5 minutes
}

fn default_send_timeout_secs() -> u64 {
    10
}

fn default_send_queue_depth() -> usize {
    64
}

fn default_max_send_drops() -> u64 {
    100
}

fn default_connections_per_minute_per_ip() -> u32 {
    60
}

fn default_messages_per_second() -> u32 {
    200
}

fn default_global_messages_per_second() -> u32 {
    10_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: default_bind_address(),
            },
            limits: LimitsConfig {
                max_concurrent_sessions: default_max_concurrent_sessions(),
                max_frame_size: default_max_frame_size(),
                max_recipients: default_max_recipients(),
                max_identifier_len: default_max_identifier_len(),
                join_timeout_secs: default_join_timeout_secs(),
                idle_timeout_secs: default_idle_timeout_secs(),
                send_timeout_secs: default_send_timeout_secs(),
                send_queue_depth: default_send_queue_depth(),
                max_send_drops: default_max_send_drops(),
                connections_per_minute_per_ip: default_connections_per_minute_per_ip(),
                messages_per_second: default_messages_per_second(),
                global_messages_per_second: default_global_messages_per_second(),
            },
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.server.bind_address, "127.0.0.1:9440");
        assert_eq!(config.limits.max_frame_size, 1024 * 1024);
        assert_eq!(config.limits.max_concurrent_sessions, 10_000);
        assert_eq!(config.limits.send_queue_depth, 64);
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[server]
bind_address = "0.0.0.0:5000"

[limits]
max_frame_size = 2097152
max_recipients = 16
idle_timeout_secs = 60
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.bind_address, "0.0.0.0:5000");
        assert_eq!(config.limits.max_frame_size, 2097152);
        assert_eq!(config.limits.max_recipients, 16);
        assert_eq!(config.limits.idle_timeout_secs, 60);
    }

    #[test]
    fn join_timeout_has_default() {
        let config = Config::default();
        assert_eq!(config.limits.join_timeout_secs, 10);
    }

    #[test]
    fn join_timeout_configurable_from_toml() {
        let toml = r#"
[server]
[limits]
join_timeout_secs = 30
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.limits.join_timeout_secs, 30);
    }

    #[test]
    fn config_missing_fields_use_defaults() {
        let toml = r#"
[server]
[limits]
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.limits.max_frame_size, 1024 * 1024);
        assert_eq!(config.limits.idle_timeout_secs, 300);
        assert_eq!(config.limits.messages_per_second, 200);
    }

    #[test]
    fn config_from_file_roundtrip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[server]
bind_address = "127.0.0.1:7000"

[limits]
max_send_drops = 5
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:7000");
        assert_eq!(config.limits.max_send_drops, 5);
    }

    #[test]
    fn config_from_missing_file_is_read_error() {
        let err = Config::from_file(std::path::Path::new("/nonexistent/relay.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }
}
