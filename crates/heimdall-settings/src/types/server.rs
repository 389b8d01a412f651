//! Listener and logging settings.

use heimdall_core::constants::DEFAULT_BASE_PATH;
use heimdall_core::logging::LogFormat;
use serde::{Deserialize, Serialize};

/// HTTP listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port (0 picks an ephemeral port).
    pub port: u16,
    /// Prefix under which every Heimdall route is mounted.
    pub base_path: String,
    /// Maximum accepted request body, in bytes.
    pub max_body_bytes: usize,
    /// Time allowed for in-flight work to finish on shutdown, in milliseconds.
    pub shutdown_timeout_ms: u64,
    /// Expose `/metrics` in Prometheus text format.
    pub metrics_enabled: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5080,
            base_path: DEFAULT_BASE_PATH.to_string(),
            max_body_bytes: 1024 * 1024,
            shutdown_timeout_ms: 5_000,
            metrics_enabled: true,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}
