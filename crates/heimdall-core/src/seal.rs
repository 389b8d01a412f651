//! Tamper-evident, time-limited envelopes.
//!
//! A [`Sealer`] encrypts a short UTF-8 payload with ChaCha20-Poly1305 and
//! embeds an absolute expiry inside the ciphertext. The purpose string is
//! bound as associated data, so an envelope sealed for one purpose never
//! opens under another even with the same key.
//!
//! Wire format (base64url, no padding): `nonce(12) || ciphertext`, where the
//! plaintext is `expiry_unix_ms(i64 BE) || payload`.

use std::fmt;
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use chacha20poly1305::aead::{Aead, KeyInit, OsRng, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use chrono::{DateTime, TimeZone, Utc};

const NONCE_LEN: usize = 12;
const EXPIRY_LEN: usize = 8;

/// Length in bytes of a sealing key.
pub const KEY_LEN: usize = 32;

/// Errors from sealing, unsealing and key management.
#[derive(Debug, thiserror::Error)]
pub enum SealError {
    /// AEAD encryption failed.
    #[error("encryption failed")]
    EncryptionFailed,
    /// Bad key, bad purpose or tampered ciphertext.
    #[error("decryption failed")]
    DecryptionFailed,
    /// Not valid base64, or too short to hold an envelope.
    #[error("invalid encoding")]
    InvalidEncoding,
    /// Envelope opened but its expiry has passed.
    #[error("envelope expired at {0}")]
    Expired(DateTime<Utc>),
    /// Payload was not UTF-8.
    #[error("invalid UTF-8")]
    InvalidUtf8,
    /// Key file did not hold exactly 32 bytes.
    #[error("invalid key length")]
    InvalidKeyLength,
    /// Key file I/O failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A successfully opened envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unsealed {
    /// The payload as sealed.
    pub payload: String,
    /// When the envelope stops being valid.
    pub expires_at: DateTime<Utc>,
}

/// Seals and opens envelopes for one purpose.
#[derive(Clone)]
pub struct Sealer {
    cipher: ChaCha20Poly1305,
    key: [u8; KEY_LEN],
    purpose: String,
}

impl fmt::Debug for Sealer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sealer")
            .field("purpose", &self.purpose)
            .finish_non_exhaustive()
    }
}

impl Sealer {
    /// Create a sealer bound to `purpose`.
    pub fn new(key: &[u8; KEY_LEN], purpose: impl Into<String>) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(key.into()),
            key: *key,
            purpose: purpose.into(),
        }
    }

    /// A sealer with the same key and a different purpose.
    #[must_use]
    pub fn for_purpose(&self, purpose: impl Into<String>) -> Self {
        Self::new(&self.key, purpose)
    }

    /// The purpose this sealer is bound to.
    pub fn purpose(&self) -> &str {
        &self.purpose
    }

    /// Seal `payload`, valid until `expires_at`.
    pub fn seal(&self, payload: &str, expires_at: DateTime<Utc>) -> Result<String, SealError> {
        let mut plaintext = Vec::with_capacity(EXPIRY_LEN + payload.len());
        plaintext.extend_from_slice(&expires_at.timestamp_millis().to_be_bytes());
        plaintext.extend_from_slice(payload.as_bytes());

        let mut nonce_bytes = [0u8; NONCE_LEN];
        chacha20poly1305::aead::rand_core::RngCore::fill_bytes(&mut OsRng, &mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(
                nonce,
                Payload {
                    msg: &plaintext,
                    aad: self.purpose.as_bytes(),
                },
            )
            .map_err(|_| SealError::EncryptionFailed)?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(combined))
    }

    /// Open an envelope, rejecting it if it has expired.
    pub fn unseal(&self, token: &str) -> Result<Unsealed, SealError> {
        self.unseal_at(token, Utc::now())
    }

    /// Open an envelope as of `now`.
    pub fn unseal_at(&self, token: &str, now: DateTime<Utc>) -> Result<Unsealed, SealError> {
        let combined = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| SealError::InvalidEncoding)?;
        if combined.len() < NONCE_LEN {
            return Err(SealError::InvalidEncoding);
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(nonce_bytes),
                Payload {
                    msg: ciphertext,
                    aad: self.purpose.as_bytes(),
                },
            )
            .map_err(|_| SealError::DecryptionFailed)?;

        if plaintext.len() < EXPIRY_LEN {
            return Err(SealError::InvalidEncoding);
        }
        let (expiry_bytes, payload) = plaintext.split_at(EXPIRY_LEN);
        let mut millis = [0u8; EXPIRY_LEN];
        millis.copy_from_slice(expiry_bytes);
        let expires_at = Utc
            .timestamp_millis_opt(i64::from_be_bytes(millis))
            .single()
            .ok_or(SealError::InvalidEncoding)?;
        if now >= expires_at {
            return Err(SealError::Expired(expires_at));
        }

        let payload = String::from_utf8(payload.to_vec()).map_err(|_| SealError::InvalidUtf8)?;
        Ok(Unsealed {
            payload,
            expires_at,
        })
    }
}

/// Generate a random 256-bit key.
pub fn generate_key() -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    chacha20poly1305::aead::rand_core::RngCore::fill_bytes(&mut OsRng, &mut key);
    key
}

/// Load the key at `path`, creating it (mode 0600 on Unix) if it does not exist.
pub fn load_or_create_key(path: &Path) -> Result<[u8; KEY_LEN], SealError> {
    if path.exists() {
        let encoded = std::fs::read_to_string(path)?;
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|_| SealError::InvalidEncoding)?;
        let key: [u8; KEY_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| SealError::InvalidKeyLength)?;
        tracing::debug!(path = %path.display(), "loaded sealing key");
        return Ok(key);
    }

    let key = generate_key();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, STANDARD.encode(key))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    tracing::info!(path = %path.display(), "created sealing key");
    Ok(key)
}

/// Constant-time byte comparison.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
