//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`HeimdallSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `HEIMDALL_*` environment variable overrides
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::{HeimdallSettings, MIN_MESSAGE_TTL_FLOOR_MS};

/// Env var naming an explicit settings file.
pub const SETTINGS_PATH_ENV: &str = "HEIMDALL_SETTINGS";

/// Resolve the settings file: `$HEIMDALL_SETTINGS`, else `./heimdall.json`.
pub fn settings_path() -> PathBuf {
    std::env::var(SETTINGS_PATH_ENV)
        .ok()
        .filter(|v| !v.is_empty())
        .map_or_else(|| PathBuf::from("heimdall.json"), PathBuf::from)
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<HeimdallSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON or an invalid final
/// configuration is an error.
pub fn load_settings_from_path(path: &Path) -> Result<HeimdallSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

fn load_file_layer(path: &Path) -> Result<HeimdallSettings> {
    let defaults = serde_json::to_value(HeimdallSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `HEIMDALL_*` overrides from the process environment.
pub fn apply_env_overrides(settings: &mut HeimdallSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Invalid values are logged and ignored, leaving the file/default value.
pub fn apply_overrides_from(
    settings: &mut HeimdallSettings,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let env = EnvReader { lookup };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("HEIMDALL_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u16("HEIMDALL_PORT", 0, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = env.raw("HEIMDALL_BASE_PATH") {
        settings.server.base_path = v;
    }
    if let Some(v) = env.usize("HEIMDALL_MAX_BODY_BYTES", 1024, 64 * 1024 * 1024) {
        settings.server.max_body_bytes = v;
    }
    if let Some(v) = env.u64("HEIMDALL_SHUTDOWN_TIMEOUT_MS", 0, 600_000) {
        settings.server.shutdown_timeout_ms = v;
    }
    if let Some(v) = env.bool("HEIMDALL_METRICS") {
        settings.server.metrics_enabled = v;
    }

    // ── Actions ─────────────────────────────────────────────────────
    if let Some(v) = env.bool("HEIMDALL_DETAILED_ERRORS") {
        settings.actions.enable_detailed_errors = v;
    }
    if let Some(v) = env.u64("HEIMDALL_HANDLER_TIMEOUT_MS", 100, 3_600_000) {
        settings.actions.handler_timeout_ms = v;
    }

    // ── Bifrost ─────────────────────────────────────────────────────
    if let Some(v) = env.usize("HEIMDALL_SUBSCRIBER_BUFFER", 1, 65_536) {
        settings.bifrost.subscriber_buffer = v;
    }
    if let Some(v) = env.u64("HEIMDALL_HEARTBEAT_INTERVAL_MS", 100, 600_000) {
        settings.bifrost.heartbeat_interval_ms = v;
    }
    if let Some(v) = env.u64("HEIMDALL_TOKEN_TTL_SECS", 1, 86_400) {
        settings.bifrost.token_ttl_secs = v;
    }
    if let Some(v) = env.u64(
        "HEIMDALL_MIN_MESSAGE_TTL_MS",
        MIN_MESSAGE_TTL_FLOOR_MS,
        3_600_000,
    ) {
        settings.bifrost.min_message_ttl_ms = v;
    }

    // ── Security ────────────────────────────────────────────────────
    if let Some(v) = env.string("HEIMDALL_KEY_PATH") {
        settings.security.key_path = Some(v);
    }
    if let Some(v) = env.bool("HEIMDALL_SECURE_COOKIES") {
        settings.security.secure_cookies = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("HEIMDALL_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.string("HEIMDALL_LOG_FORMAT") {
        match serde_json::from_value(Value::String(v.to_lowercase())) {
            Ok(format) => settings.logging.format = format,
            Err(_) => tracing::warn!(value = %v, "invalid HEIMDALL_LOG_FORMAT, ignoring"),
        }
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env readers ─────────────────────────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn raw(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
    }

    fn string(&self, name: &str) -> Option<String> {
        self.raw(name).filter(|v| !v.is_empty())
    }

    fn checked<T>(&self, name: &str, kind: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        let val = self.raw(name)?;
        let result = parse(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, kind, "invalid env var, ignoring");
        }
        result
    }

    fn bool(&self, name: &str) -> Option<bool> {
        self.checked(name, "bool", parse_bool)
    }

    fn u16(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        self.checked(name, "u16", |v| parse_u16_range(v, min, max))
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        self.checked(name, "u64", |v| parse_u64_range(v, min, max))
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        self.checked(name, "usize", |v| parse_usize_range(v, min, max))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;
    use heimdall_core::logging::LogFormat;

    use super::*;
    use crate::errors::SettingsError;

    fn overrides(pairs: &[(&str, &str)]) -> HeimdallSettings {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let mut settings = HeimdallSettings::default();
        apply_overrides_from(&mut settings, |k| map.get(k).cloned());
        settings
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"port": 8080, "host": "localhost"}});
        let source = serde_json::json!({"server": {"port": 9090}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "localhost");
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4, 5]});
        assert_eq!(deep_merge(target, source)["items"], serde_json::json!([4, 5]));
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        assert_eq!(deep_merge(target, source)["a"], 42);
    }

    // ── load_settings_from_path ─────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_file_layer(&dir.path().join("missing.json")).unwrap();
        assert_eq!(settings.server.port, 5080);
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heimdall.json");
        std::fs::write(
            &path,
            r#"{"server": {"port": 9090}, "actions": {"enableDetailedErrors": true}}"#,
        )
        .unwrap();

        let settings = load_file_layer(&path).unwrap();
        assert_eq!(settings.server.port, 9090);
        assert!(settings.actions.enable_detailed_errors);
        assert_eq!(settings.server.base_path, "/__heimdall");
        assert_eq!(settings.actions.handler_timeout_ms, 60_000);
    }

    #[test]
    fn load_invalid_json_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heimdall.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_matches!(load_file_layer(&path), Err(SettingsError::Json(_)));
    }

    #[test]
    fn load_rejects_invalid_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heimdall.json");
        std::fs::write(&path, r#"{"bifrost": {"subscriberBuffer": 0}}"#).unwrap();
        assert_matches!(
            load_settings_from_path(&path),
            Err(SettingsError::InvalidValue { field: "bifrost.subscriberBuffer", .. })
        );
    }

    // ── env overrides ───────────────────────────────────────────────

    #[test]
    fn env_overrides_apply() {
        let s = overrides(&[
            ("HEIMDALL_PORT", "7000"),
            ("HEIMDALL_DETAILED_ERRORS", "yes"),
            ("HEIMDALL_SUBSCRIBER_BUFFER", "16"),
            ("HEIMDALL_KEY_PATH", "/tmp/heimdall.key"),
            ("HEIMDALL_LOG_FORMAT", "JSON"),
        ]);
        assert_eq!(s.server.port, 7000);
        assert!(s.actions.enable_detailed_errors);
        assert_eq!(s.bifrost.subscriber_buffer, 16);
        assert_eq!(s.security.key_path.as_deref(), Some("/tmp/heimdall.key"));
        assert_eq!(s.logging.format, LogFormat::Json);
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let s = overrides(&[
            ("HEIMDALL_PORT", "not-a-port"),
            ("HEIMDALL_SUBSCRIBER_BUFFER", "0"),
            ("HEIMDALL_DETAILED_ERRORS", "maybe"),
            ("HEIMDALL_MIN_MESSAGE_TTL_MS", "0"),
        ]);
        assert_eq!(s.server.port, 5080);
        assert_eq!(s.bifrost.subscriber_buffer, 64);
        assert_eq!(s.bifrost.min_message_ttl_ms, MIN_MESSAGE_TTL_FLOOR_MS);
        assert!(!s.actions.enable_detailed_errors);
    }

    #[test]
    fn empty_base_path_env_is_respected() {
        let s = overrides(&[("HEIMDALL_BASE_PATH", "")]);
        assert_eq!(s.server.base_path, "");
    }

    // ── parsers ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("2"), None);
    }

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u16_range("80", 1, 65535), Some(80));
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u64_range("5000", 100, 10_000), Some(5000));
        assert_eq!(parse_usize_range("100000", 1, 65_536), None);
    }
}
