//! Error type for the crypto operators.
//!
//! These variants exist for internal logs only. Every one of them collapses
//! to the single `UNSPECIFIED` wire code at the handler boundary; the client
//! never learns which one occurred.

use thiserror::Error;

/// Errors from the signing and decryption adapters.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Operand bytes were not valid base64.
    #[error("Input decoding failed: {0}")]
    InputDecoding(String),

    /// Stored key bytes were not a usable PKCS8 private key.
    #[error("Key decoding failed: {0}")]
    KeyDecoding(String),

    /// Signature computation failed.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Private-key decryption failed. Deliberately carries no cause: padding
    /// faults and key faults must be indistinguishable to callers.
    #[error("Decryption failed")]
    Decryption,
}

impl CryptoError {
    /// Create an input-decoding error.
    #[must_use]
    pub fn input_decoding(msg: impl Into<String>) -> Self {
        CryptoError::InputDecoding(msg.into())
    }

    /// Create a key-decoding error.
    #[must_use]
    pub fn key_decoding(msg: impl Into<String>) -> Self {
        CryptoError::KeyDecoding(msg.into())
    }

    /// Create a signing error.
    #[must_use]
    pub fn signing(msg: impl Into<String>) -> Self {
        CryptoError::Signing(msg.into())
    }
}
