//! Redis-backed TLS signing oracle.
//!
//! Completes the private-key step of a TLS handshake on behalf of a
//! TLS-terminating proxy: RSA decryption of a premaster secret, or signing
//! of an ECDHE transcript hash, keyed by an opaque certificate fingerprint.
//! Private keys live only in the backing store and never leave this process.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod crypto;
pub mod error;
pub mod monitor;
pub mod protocol;
pub mod server;
pub mod store;

// Re-exports for convenience
pub use config::Config;
pub use error::ServiceError;
pub use protocol::{ErrorCode, Outcome, RequestHandler};
pub use store::KeyStore;
