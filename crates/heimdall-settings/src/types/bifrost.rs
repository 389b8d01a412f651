//! Broker and streaming settings.

use serde::{Deserialize, Serialize};

/// Lowest accepted `minMessageTtlMs`; no message may live shorter than this.
pub const MIN_MESSAGE_TTL_FLOOR_MS: u64 = 5_000;

/// Broker and streaming settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BifrostSettings {
    /// Per-subscriber queue capacity; the oldest message is evicted beyond it.
    pub subscriber_buffer: usize,
    /// Interval between `: ping` comments on an idle stream, in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Lifetime of a subscribe token, in seconds.
    pub token_ttl_secs: u64,
    /// Floor applied to every message TTL, in milliseconds. At least
    /// [`MIN_MESSAGE_TTL_FLOOR_MS`].
    pub min_message_ttl_ms: u64,
}

impl Default for BifrostSettings {
    fn default() -> Self {
        Self {
            subscriber_buffer: 64,
            heartbeat_interval_ms: 15_000,
            token_ttl_secs: 120,
            min_message_ttl_ms: MIN_MESSAGE_TTL_FLOOR_MS,
        }
    }
}
