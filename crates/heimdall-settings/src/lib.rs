//! # heimdall-settings
//!
//! Configuration with layered sources.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`HeimdallSettings::default()`]
//! 2. **Settings file**: `heimdall.json` in the working directory, or the
//!    path named by `HEIMDALL_SETTINGS` (deep-merged over defaults)
//! 3. **Environment variables**: `HEIMDALL_*` overrides (highest priority)
//!
//! After loading, [`HeimdallSettings::validate`] rejects combinations the
//! server cannot run with.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::sync::OnceLock;

static SETTINGS: OnceLock<HeimdallSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// On first call, loads settings from [`settings_path`] with env var
/// overrides. If loading fails, returns compiled defaults.
pub fn get_settings() -> &'static HeimdallSettings {
    SETTINGS.get_or_init(|| {
        load_settings().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            HeimdallSettings::default()
        })
    })
}

/// Initialize the global settings with a specific value.
///
/// Returns the settings back if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: HeimdallSettings) -> std::result::Result<(), HeimdallSettings> {
    SETTINGS.set(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        let settings = HeimdallSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.server.port, 5080);
        assert_eq!(settings.server.base_path, "/__heimdall");
        assert!(!settings.actions.enable_detailed_errors);
        assert_eq!(settings.bifrost.subscriber_buffer, 64);
        assert_eq!(settings.bifrost.heartbeat_interval_ms, 15_000);
        assert_eq!(settings.bifrost.token_ttl_secs, 120);
        assert_eq!(settings.bifrost.min_message_ttl_ms, 5_000);
        assert_eq!(settings.security.csrf_header, "RequestVerificationToken");
    }
}
