//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a settings
//! file may be partial; missing fields take their default value.

mod actions;
mod bifrost;
mod security;
mod server;

pub use actions::*;
pub use bifrost::*;
pub use security::*;
pub use server::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 8080 },
///   "actions": { "enableDetailedErrors": true },
///   "bifrost": { "subscriberBuffer": 128 }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeimdallSettings {
    /// HTTP listener settings.
    pub server: ServerSettings,
    /// Action dispatch settings.
    pub actions: ActionSettings,
    /// Broker and streaming settings.
    pub bifrost: BifrostSettings,
    /// Anti-forgery and key settings.
    pub security: SecuritySettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl HeimdallSettings {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        let base = &self.server.base_path;
        if !base.is_empty() && (!base.starts_with('/') || base.ends_with('/')) {
            return Err(SettingsError::invalid(
                "server.basePath",
                format!("must start with '/' and not end with '/': {base:?}"),
            ));
        }
        if self.bifrost.subscriber_buffer == 0 {
            return Err(SettingsError::invalid(
                "bifrost.subscriberBuffer",
                "must be at least 1",
            ));
        }
        if self.bifrost.heartbeat_interval_ms == 0 {
            return Err(SettingsError::invalid(
                "bifrost.heartbeatIntervalMs",
                "must be positive",
            ));
        }
        if self.bifrost.token_ttl_secs == 0 {
            return Err(SettingsError::invalid("bifrost.tokenTtlSecs", "must be positive"));
        }
        if self.bifrost.min_message_ttl_ms < MIN_MESSAGE_TTL_FLOOR_MS {
            return Err(SettingsError::invalid(
                "bifrost.minMessageTtlMs",
                format!(
                    "must be at least {MIN_MESSAGE_TTL_FLOOR_MS}, got {}",
                    self.bifrost.min_message_ttl_ms
                ),
            ));
        }
        if self.security.csrf_header.trim().is_empty() {
            return Err(SettingsError::invalid("security.csrfHeader", "must be non-empty"));
        }
        if self.security.csrf_cookie.trim().is_empty() {
            return Err(SettingsError::invalid("security.csrfCookie", "must be non-empty"));
        }
        Ok(())
    }
}
