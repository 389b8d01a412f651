//! Action dispatch settings.

use serde::{Deserialize, Serialize};

/// Action dispatch settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionSettings {
    /// Include the underlying error message in `HandlerFault` responses.
    pub enable_detailed_errors: bool,
    /// Upper bound on a single handler invocation, in milliseconds.
    pub handler_timeout_ms: u64,
    /// Log a warning for invocations slower than this, in milliseconds.
    pub slow_action_ms: u64,
}

impl Default for ActionSettings {
    fn default() -> Self {
        Self {
            enable_detailed_errors: false,
            handler_timeout_ms: 60_000,
            slow_action_ms: 5_000,
        }
    }
}
