//! Anti-forgery and key settings.

use heimdall_core::constants::{DEFAULT_CSRF_COOKIE, DEFAULT_CSRF_HEADER};
use serde::{Deserialize, Serialize};

/// Anti-forgery and key settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecuritySettings {
    /// File holding the sealing key. When unset a fresh key is generated per
    /// process, so tokens do not survive a restart.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_path: Option<String>,
    /// Header carrying the anti-forgery request token.
    pub csrf_header: String,
    /// Cookie carrying the anti-forgery cookie token.
    pub csrf_cookie: String,
    /// Mark the anti-forgery cookie `Secure`.
    pub secure_cookies: bool,
    /// Lifetime of an anti-forgery request token, in seconds.
    pub csrf_token_ttl_secs: u64,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            key_path: None,
            csrf_header: DEFAULT_CSRF_HEADER.to_string(),
            csrf_cookie: DEFAULT_CSRF_COOKIE.to_string(),
            secure_cookies: false,
            csrf_token_ttl_secs: 2 * 60 * 60,
        }
    }
}
