//! Server construction errors.

use heimdall_core::SealError;
use heimdall_settings::SettingsError;

use crate::actions::RegistrationError;

/// Failure while building or running a [`HeimdallServer`](crate::HeimdallServer).
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Action registration or service validation failed.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// Settings were invalid.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// Key material could not be loaded or created.
    #[error("key material: {0}")]
    Key(#[from] SealError),

    /// Listener or socket failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
