//! Top-level error type for bootstrap and wiring paths.
//!
//! Request-path failures never use this type; they are classified into the
//! stable wire codes in [`crate::protocol::ErrorCode`] before crossing the
//! trust boundary.

use thiserror::Error;

/// Errors raised while bringing the service up or tearing it down.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Store setup failed in a non-degradable way (e.g. unparseable address).
    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    /// Listener setup or socket failure.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl ServiceError {
    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        ServiceError::Config(msg.into())
    }

    /// Create a transport error.
    #[must_use]
    pub fn transport(msg: impl Into<String>) -> Self {
        ServiceError::Transport(msg.into())
    }
}
