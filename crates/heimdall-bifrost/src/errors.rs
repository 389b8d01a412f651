//! Broker error types.

use heimdall_core::SealError;

/// Errors surfaced by broker and token operations.
///
/// Queue overflow is never an error; see [`crate::PublishReport::evicted`].
#[derive(Debug, thiserror::Error)]
pub enum BifrostError {
    /// Topic was empty or whitespace.
    #[error("topic must be a non-empty string")]
    InvalidTopic,
    /// The caller's cancellation signal had already fired.
    #[error("operation cancelled")]
    Cancelled,
    /// Token sealing failed.
    #[error("token error: {0}")]
    Token(#[from] SealError),
}

/// Result type for broker operations.
pub type Result<T> = std::result::Result<T, BifrostError>;
