//! Double-submit anti-forgery tokens.
//!
//! The browser holds a random cookie token in an `HttpOnly` cookie. Scripts
//! obtain a request token from the csrf endpoint: a sealed envelope carrying
//! that cookie value and an expiry. A request passes only when both arrive
//! and the request token opens to exactly the cookie value.

use std::fmt::Write as _;
use std::time::Duration;

use axum::http::header::{COOKIE, HeaderName};
use axum::http::{HeaderMap, HeaderValue};
use chrono::Utc;
use heimdall_core::seal::{KEY_LEN, constant_time_eq};
use heimdall_core::{SealError, Sealer};
use heimdall_settings::SecuritySettings;

/// Purpose string bound into every request token.
pub const ANTIFORGERY_PURPOSE: &str = "heimdall.antiforgery.v1";

const COOKIE_TOKEN_BYTES: usize = 16;

/// Why a request failed the anti-forgery check.
#[derive(Debug, thiserror::Error)]
pub enum AntiforgeryError {
    /// No anti-forgery cookie on the request.
    #[error("anti-forgery cookie is missing")]
    MissingCookie,
    /// No request token header.
    #[error("anti-forgery request token is missing")]
    MissingToken,
    /// Request token did not open.
    #[error("anti-forgery request token is invalid: {0}")]
    InvalidToken(#[from] SealError),
    /// Request token was issued for a different cookie.
    #[error("anti-forgery request token does not match cookie")]
    Mismatch,
    /// Configured header or cookie name is not a valid HTTP token.
    #[error("invalid anti-forgery configuration: {0}")]
    Config(String),
}

/// Result of [`Antiforgery::issue`].
#[derive(Clone, Debug)]
pub struct IssuedAntiforgery {
    /// Token the client echoes in the request header.
    pub request_token: String,
    /// Cookie value the request token is bound to.
    pub cookie_token: String,
    /// `Set-Cookie` value when a new cookie was minted.
    pub set_cookie: Option<HeaderValue>,
}

/// Issues and validates anti-forgery token pairs.
#[derive(Clone, Debug)]
pub struct Antiforgery {
    sealer: Sealer,
    header: HeaderName,
    cookie: String,
    secure: bool,
    ttl: Duration,
}

impl Antiforgery {
    /// Build from a sealing key and settings.
    ///
    /// An unusable header name falls back to the default.
    pub fn new(key: &[u8; KEY_LEN], settings: &SecuritySettings) -> Self {
        let header = HeaderName::from_bytes(settings.csrf_header.to_ascii_lowercase().as_bytes())
            .unwrap_or_else(|_| {
                tracing::warn!(header = %settings.csrf_header, "invalid csrf header name, using default");
                HeaderName::from_static("requestverificationtoken")
            });
        Self {
            sealer: Sealer::new(key, ANTIFORGERY_PURPOSE),
            header,
            cookie: settings.csrf_cookie.clone(),
            secure: settings.secure_cookies,
            ttl: Duration::from_secs(settings.csrf_token_ttl_secs.max(1)),
        }
    }

    /// Header the request token travels in.
    pub fn header_name(&self) -> &HeaderName {
        &self.header
    }

    /// Cookie the cookie token travels in.
    pub fn cookie_name(&self) -> &str {
        &self.cookie
    }

    /// Issue a request token, reusing the caller's cookie token when present.
    pub fn issue(&self, headers: &HeaderMap) -> Result<IssuedAntiforgery, AntiforgeryError> {
        let existing = read_cookie(headers, &self.cookie).filter(|v| is_cookie_token(v));
        let (cookie_token, set_cookie) = match existing {
            Some(token) => (token, None),
            None => {
                let token = random_token();
                let cookie = self.set_cookie_value(&token)?;
                (token, Some(cookie))
            }
        };

        let expires_at = chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d))
            .unwrap_or_else(Utc::now);
        let request_token = self.sealer.seal(&cookie_token, expires_at)?;

        Ok(IssuedAntiforgery {
            request_token,
            cookie_token,
            set_cookie,
        })
    }

    /// Check the cookie/header pair on a request.
    pub fn validate(&self, headers: &HeaderMap) -> Result<(), AntiforgeryError> {
        let cookie = read_cookie(headers, &self.cookie).ok_or(AntiforgeryError::MissingCookie)?;
        let token = headers
            .get(&self.header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(AntiforgeryError::MissingToken)?;

        let opened = self.sealer.unseal(token)?;
        if constant_time_eq(opened.payload.as_bytes(), cookie.as_bytes()) {
            Ok(())
        } else {
            Err(AntiforgeryError::Mismatch)
        }
    }

    fn set_cookie_value(&self, token: &str) -> Result<HeaderValue, AntiforgeryError> {
        let mut value = format!("{}={token}; Path=/; HttpOnly; SameSite=Strict", self.cookie);
        if self.secure {
            value.push_str("; Secure");
        }
        HeaderValue::from_str(&value).map_err(|e| AntiforgeryError::Config(e.to_string()))
    }
}

/// Value of cookie `name` from any `Cookie` header.
fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn is_cookie_token(value: &str) -> bool {
    value.len() == COOKIE_TOKEN_BYTES * 2 && value.chars().all(|c| c.is_ascii_hexdigit())
}

fn random_token() -> String {
    let bytes: [u8; COOKIE_TOKEN_BYTES] = rand::random();
    bytes
        .iter()
        .fold(String::with_capacity(COOKIE_TOKEN_BYTES * 2), |mut s, b| {
            let _ = write!(s, "{b:02x}");
            s
        })
}
