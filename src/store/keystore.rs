//! Connection-state tracking and the key access contract.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};
use zeroize::Zeroizing;

use super::{StoreBackend, StoreError};

/// Key store over an external key-value backend.
///
/// Owns the only shared mutable state in the service: the connected flag
/// and the reconnect guard. Accessors never raise; when the store is known
/// disconnected they return absent/false, so a store outage degrades the
/// request path to per-request `NOT_FOUND` instead of crashing the handler.
pub struct KeyStore {
    backend: Arc<dyn StoreBackend>,
    connected: AtomicBool,
    reconnecting: AtomicBool,
}

impl KeyStore {
    /// Wrap a backend and attempt the initial connection.
    ///
    /// Initial failure is logged and leaves the store disconnected; the
    /// service stays up and the next liveness probe retries.
    pub async fn new(backend: Arc<dyn StoreBackend>) -> Self {
        let store = Self {
            backend,
            connected: AtomicBool::new(false),
            reconnecting: AtomicBool::new(false),
        };
        match store.backend.reconnect().await {
            Ok(()) => store.connected.store(true, Ordering::SeqCst),
            Err(e) => error!(error = %e, "Key store initialization failed; starting disconnected"),
        }
        store
    }

    /// Decoded private-key bytes for `fingerprint`, or absent.
    ///
    /// The store holds keys base64-encoded; decoding happens here so the
    /// protocol layer only ever sees raw DER. The returned buffer zeroizes
    /// on drop.
    pub async fn get(&self, fingerprint: &str) -> Option<Zeroizing<Vec<u8>>> {
        let raw = self.get_raw(fingerprint).await?;
        match STANDARD.decode(raw.trim()) {
            Ok(bytes) => Some(Zeroizing::new(bytes)),
            Err(e) => {
                error!(fingerprint, error = %e, "Stored key is not valid base64");
                None
            }
        }
    }

    /// Stored base64 string for `fingerprint` without decoding
    /// (provisioning and admin paths).
    pub async fn get_raw(&self, fingerprint: &str) -> Option<String> {
        if !self.connected.load(Ordering::SeqCst) {
            return None;
        }
        match self.backend.get(fingerprint).await {
            Ok(value) => {
                debug!(fingerprint, found = value.is_some(), "Store query");
                value
            }
            Err(e) => {
                self.mark_disconnected(&e);
                None
            }
        }
    }

    /// Store a key and verify the write with an immediate re-read.
    ///
    /// A write that does not read back byte-for-byte identical reports
    /// failure. The write+verify pair is not atomic across concurrent
    /// writers to the same fingerprint; last writer wins.
    pub async fn put(&self, fingerprint: &str, key_b64: &str) -> bool {
        if !self.connected.load(Ordering::SeqCst) {
            return false;
        }
        if let Err(e) = self.backend.set(fingerprint, key_b64).await {
            self.mark_disconnected(&e);
            return false;
        }
        match self.backend.get(fingerprint).await {
            Ok(Some(read_back)) => read_back == key_b64,
            Ok(None) => {
                warn!(fingerprint, "Write verification found no record");
                false
            }
            Err(e) => {
                self.mark_disconnected(&e);
                false
            }
        }
    }

    /// Remove a key. True only if a record existed and was removed.
    pub async fn delete(&self, fingerprint: &str) -> bool {
        if !self.connected.load(Ordering::SeqCst) {
            return false;
        }
        match self.backend.delete(fingerprint).await {
            Ok(removed) => removed,
            Err(e) => {
                self.mark_disconnected(&e);
                false
            }
        }
    }

    /// Schedule store-native removal at an absolute unix timestamp. The key
    /// vanishes from the store at that time without any polling here.
    pub async fn expire_at(&self, fingerprint: &str, unix_ts: i64) -> bool {
        if !self.connected.load(Ordering::SeqCst) {
            return false;
        }
        match self.backend.expire_at(fingerprint, unix_ts).await {
            Ok(set) => set,
            Err(e) => {
                self.mark_disconnected(&e);
                false
            }
        }
    }

    /// Fingerprints matching `pattern` (operational tooling, not the
    /// request path).
    pub async fn list(&self, pattern: &str) -> HashSet<String> {
        if !self.connected.load(Ordering::SeqCst) {
            return HashSet::new();
        }
        match self.backend.keys(pattern).await {
            Ok(keys) => keys,
            Err(e) => {
                self.mark_disconnected(&e);
                HashSet::new()
            }
        }
    }

    /// Probe store liveness.
    ///
    /// On failure this sets the reconnect guard, attempts exactly one
    /// inline reconnect, clears the guard, and reports the pre-reconnect
    /// liveness (`false`) to the caller. Concurrent probes during a
    /// reconnect observe the held guard and do not spawn their own attempt.
    pub async fn is_connected(&self) -> bool {
        match self.backend.ping().await {
            Ok(()) => {
                self.connected.store(true, Ordering::SeqCst);
                true
            }
            Err(e) => {
                self.connected.store(false, Ordering::SeqCst);
                if self
                    .reconnecting
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
                {
                    debug!(error = %e, "Store probe failed; attempting reconnect");
                    match self.backend.reconnect().await {
                        Ok(()) => self.connected.store(true, Ordering::SeqCst),
                        Err(e) => warn!(error = %e, "Store reconnect failed"),
                    }
                    self.reconnecting.store(false, Ordering::SeqCst);
                }
                false
            }
        }
    }

    fn mark_disconnected(&self, err: &StoreError) {
        self.connected.store(false, Ordering::SeqCst);
        warn!(error = %err, "Store operation failed; treating store as disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::super::MemoryBackend;
    use super::*;
    use async_trait::async_trait;

    async fn connected_store() -> (Arc<MemoryBackend>, KeyStore) {
        let backend = Arc::new(MemoryBackend::new());
        let store = KeyStore::new(backend.clone()).await;
        (backend, store)
    }

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let (_, store) = connected_store().await;
        let key_b64 = STANDARD.encode(b"der bytes");

        assert!(store.put("abc123", &key_b64).await);
        let decoded = store.get("abc123").await.unwrap();
        assert_eq!(&**decoded, b"der bytes");
        assert_eq!(store.get_raw("abc123").await.as_deref(), Some(key_b64.as_str()));
    }

    #[tokio::test]
    async fn test_delete_semantics() {
        let (_, store) = connected_store().await;
        assert!(store.put("abc123", "a2V5").await);
        assert!(store.delete("abc123").await);
        assert!(store.get("abc123").await.is_none());
        assert!(!store.delete("abc123").await);
        assert!(!store.delete("never-provisioned").await);
    }

    #[tokio::test]
    async fn test_expired_key_is_absent() {
        let (backend, store) = connected_store().await;
        backend.set_now(1_000_000);
        assert!(store.put("abc123", "a2V5").await);
        assert!(store.expire_at("abc123", 999_000).await);
        assert!(store.get("abc123").await.is_none());
    }

    #[tokio::test]
    async fn test_invalid_base64_value_is_absent() {
        let (backend, store) = connected_store().await;
        backend.set("abc123", "!!! not base64 !!!").await.unwrap();
        assert!(store.get("abc123").await.is_none());
        // the raw accessor still exposes the stored string
        assert!(store.get_raw("abc123").await.is_some());
    }

    #[tokio::test]
    async fn test_disconnected_accessors_are_noops() {
        let (backend, store) = connected_store().await;
        backend.set_available(false);
        assert!(!store.is_connected().await);

        let lookups_before = backend.lookup_count();
        assert!(store.get("fp").await.is_none());
        assert!(store.get_raw("fp").await.is_none());
        assert!(!store.put("fp", "a2V5").await);
        assert!(!store.delete("fp").await);
        assert!(!store.expire_at("fp", 0).await);
        assert!(store.list("*").await.is_empty());
        assert_eq!(backend.lookup_count(), lookups_before);
    }

    #[tokio::test]
    async fn test_probe_recovers_after_outage() {
        let (backend, store) = connected_store().await;
        backend.set_available(false);
        assert!(!store.is_connected().await);
        backend.set_available(true);
        assert!(store.is_connected().await);
        assert!(store.put("fp", "a2V5").await);
    }

    #[tokio::test]
    async fn test_initial_connect_failure_leaves_store_down() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_available(false);
        let store = KeyStore::new(backend.clone()).await;
        assert!(store.get("fp").await.is_none());
        // recovery path: store comes back, probe reconnects
        backend.set_available(true);
        store.is_connected().await;
        assert!(store.is_connected().await);
    }

    /// Backend whose reads never match what was written.
    struct TornWriteBackend(MemoryBackend);

    #[async_trait]
    impl StoreBackend for TornWriteBackend {
        async fn ping(&self) -> Result<(), StoreError> {
            self.0.ping().await
        }
        async fn reconnect(&self) -> Result<(), StoreError> {
            self.0.reconnect().await
        }
        async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            Ok(self.0.get(key).await?.map(|v| format!("{v}corrupted")))
        }
        async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.0.set(key, value).await
        }
        async fn delete(&self, key: &str) -> Result<bool, StoreError> {
            self.0.delete(key).await
        }
        async fn expire_at(&self, key: &str, unix_ts: i64) -> Result<bool, StoreError> {
            self.0.expire_at(key, unix_ts).await
        }
        async fn keys(&self, pattern: &str) -> Result<HashSet<String>, StoreError> {
            self.0.keys(pattern).await
        }
    }

    #[tokio::test]
    async fn test_put_fails_when_verification_mismatches() {
        let store = KeyStore::new(Arc::new(TornWriteBackend(MemoryBackend::new()))).await;
        assert!(!store.put("fp", "a2V5").await);
    }
}
