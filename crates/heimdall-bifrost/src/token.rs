//! Subscribe tokens.
//!
//! A token is a sealed `topic|nonce` payload with an embedded expiry. It is
//! minted for one topic and only ever opens a stream on that topic (compared
//! case-insensitively) before it expires. Validation fails closed: anything
//! malformed, tampered, sealed for another purpose or expired is `false`.

use std::fmt::Write as _;
use std::time::Duration;

use chrono::{DateTime, Utc};
use heimdall_core::Sealer;
use tracing::debug;

use crate::broker::topic_key;
use crate::errors::{BifrostError, Result};

/// Purpose string bound into every subscribe token.
pub const SUBSCRIBE_TOKEN_PURPOSE: &str = "heimdall.bifrost.subscribe-token.v1";

const NONCE_BYTES: usize = 16;

/// A freshly minted token.
#[derive(Clone, Debug)]
pub struct IssuedToken {
    /// Opaque token string.
    pub token: String,
    /// Lifetime the token was minted with.
    pub expires_in: Duration,
    /// Absolute expiry.
    pub expires_at: DateTime<Utc>,
}

/// Mints and validates subscribe tokens.
#[derive(Clone, Debug)]
pub struct SubscribeTokenService {
    sealer: Sealer,
    default_ttl: Duration,
}

impl SubscribeTokenService {
    /// Build from any sealer; the purpose is rebound to [`SUBSCRIBE_TOKEN_PURPOSE`].
    pub fn new(sealer: &Sealer, default_ttl: Duration) -> Self {
        Self {
            sealer: sealer.for_purpose(SUBSCRIBE_TOKEN_PURPOSE),
            default_ttl,
        }
    }

    /// Lifetime used when `create` is given none.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Mint a token for `topic`. A missing or zero `ttl` uses the default.
    pub fn create(&self, topic: &str, ttl: Option<Duration>) -> Result<IssuedToken> {
        if topic.trim().is_empty() {
            return Err(BifrostError::InvalidTopic);
        }
        let ttl = ttl.filter(|t| !t.is_zero()).unwrap_or(self.default_ttl);
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let payload = format!("{}|{}", topic.trim(), random_nonce());
        let token = self.sealer.seal(&payload, expires_at)?;
        debug!(topic, ttl_secs = ttl.as_secs(), "minted subscribe token");

        Ok(IssuedToken {
            token,
            expires_in: ttl,
            expires_at,
        })
    }

    /// True when `token` was minted for `topic` and has not expired.
    pub fn validate(&self, topic: &str, token: &str) -> bool {
        self.validate_at(topic, token, Utc::now())
    }

    /// [`validate`](Self::validate) as of `now`.
    pub fn validate_at(&self, topic: &str, token: &str, now: DateTime<Utc>) -> bool {
        if topic.trim().is_empty() || token.trim().is_empty() {
            return false;
        }
        let opened = match self.sealer.unseal_at(token, now) {
            Ok(opened) => opened,
            Err(e) => {
                debug!(topic, error = %e, "subscribe token rejected");
                return false;
            }
        };
        let Some((sealed_topic, nonce)) = opened.payload.rsplit_once('|') else {
            return false;
        };
        if nonce.is_empty() {
            return false;
        }
        topic_key(sealed_topic) == topic_key(topic)
    }
}

fn random_nonce() -> String {
    let bytes: [u8; NONCE_BYTES] = rand::random();
    bytes.iter().fold(String::with_capacity(NONCE_BYTES * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use heimdall_core::seal::generate_key;

    use super::*;

    fn service() -> SubscribeTokenService {
        let sealer = Sealer::new(&generate_key(), "anything");
        SubscribeTokenService::new(&sealer, Duration::from_secs(120))
    }

    #[test]
    fn valid_for_own_topic() {
        let s = service();
        let t = s.create("orders", None).unwrap();
        assert!(s.validate("orders", &t.token));
        assert_eq!(t.expires_in, Duration::from_secs(120));
    }

    #[test]
    fn topic_match_is_case_insensitive() {
        let s = service();
        let t = s.create("Orders", None).unwrap();
        assert!(s.validate("ORDERS", &t.token));
    }

    #[test]
    fn wrong_topic_fails() {
        let s = service();
        let t = s.create("A", None).unwrap();
        assert!(!s.validate("B", &t.token));
        assert!(!s.validate("AA", &t.token));
    }

    #[test]
    fn expired_token_fails() {
        let s = service();
        let t = s.create("orders", Some(Duration::from_secs(30))).unwrap();
        let later = Utc::now() + chrono::Duration::seconds(31);
        assert!(!s.validate_at("orders", &t.token, later));
    }

    #[test]
    fn zero_ttl_uses_default() {
        let s = service();
        let t = s.create("orders", Some(Duration::ZERO)).unwrap();
        assert_eq!(t.expires_in, s.default_ttl());
    }

    #[test]
    fn topics_containing_separator_round_trip() {
        let s = service();
        let t = s.create("a|b", None).unwrap();
        assert!(s.validate("a|b", &t.token));
        assert!(!s.validate("a", &t.token));
    }

    #[test]
    fn garbage_and_empty_fail_closed() {
        let s = service();
        assert!(!s.validate("orders", ""));
        assert!(!s.validate("orders", "not-a-token"));
        assert!(!s.validate("", "x"));
    }

    #[test]
    fn tokens_from_another_key_fail() {
        let a = service();
        let b = service();
        let t = a.create("orders", None).unwrap();
        assert!(!b.validate("orders", &t.token));
    }

    #[test]
    fn tokens_for_another_purpose_fail() {
        let key = generate_key();
        let other = Sealer::new(&key, "heimdall.antiforgery.v1");
        let forged = other
            .seal("orders|00", Utc::now() + chrono::Duration::minutes(1))
            .unwrap();
        let s = SubscribeTokenService::new(&other, Duration::from_secs(60));
        assert!(!s.validate("orders", &forged));
    }

    #[test]
    fn each_token_is_unique() {
        let s = service();
        let a = s.create("orders", None).unwrap();
        let b = s.create("orders", None).unwrap();
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn blank_topic_is_rejected() {
        assert_matches!(service().create(" ", None), Err(BifrostError::InvalidTopic));
    }

    #[test]
    fn nonce_is_hex() {
        let n = random_nonce();
        assert_eq!(n.len(), 32);
        assert!(n.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
