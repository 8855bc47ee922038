//! Key-store abstraction over the external key-value backend.
//!
//! [`KeyStore`] owns all connection-state tracking; backends only move
//! bytes and report failures. The request path talks to `KeyStore` alone.

pub mod keystore;
pub mod memory;
pub mod redis;

pub use keystore::KeyStore;
pub use memory::MemoryBackend;
pub use redis::{RedisBackend, RedisSettings};

use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;

/// Errors surfaced by store backends.
///
/// The request path never sees these directly; `KeyStore` degrades every
/// backend failure to absent/false so a store outage looks like a key miss.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No live connection to the store.
    #[error("Store not connected")]
    NotConnected,

    /// The store refused or failed an operation.
    #[error("Store I/O failed: {0}")]
    Io(String),
}

impl StoreError {
    /// Create an I/O error.
    #[must_use]
    pub fn io(msg: impl Into<String>) -> Self {
        StoreError::Io(msg.into())
    }
}

/// Verb set the backing key-value store must provide.
///
/// Implementations must be safe under concurrent invocation from many
/// simultaneous requests; `KeyStore` calls them without external locking.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Liveness probe against the live connection.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Tear down and re-establish the connection.
    async fn reconnect(&self) -> Result<(), StoreError>;

    /// Fetch the stored value for `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing any existing value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove `key`. Returns whether a record existed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Schedule store-native removal of `key` at an absolute unix time.
    /// Returns whether the key existed and the expiry was set.
    async fn expire_at(&self, key: &str, unix_ts: i64) -> Result<bool, StoreError>;

    /// Enumerate keys matching a glob-style `pattern`.
    async fn keys(&self, pattern: &str) -> Result<HashSet<String>, StoreError>;
}
