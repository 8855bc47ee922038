//! In-process backend for development and tests.
//!
//! Mirrors the Redis verb set over a map, with failure injection, a
//! freezable clock for expiry behavior, and counters that concurrency and
//! dispatch tests assert against.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use super::{StoreBackend, StoreError};

const CLOCK_UNSET: i64 = i64::MIN;

struct Entry {
    value: String,
    expires_at: Option<i64>,
}

/// In-memory [`StoreBackend`].
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Entry>>,
    available: AtomicBool,
    reconnect_attempts: AtomicUsize,
    lookups: AtomicUsize,
    frozen_now: AtomicI64,
    reconnect_delay: Duration,
}

impl MemoryBackend {
    /// Create an available, empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            reconnect_attempts: AtomicUsize::new(0),
            lookups: AtomicUsize::new(0),
            frozen_now: AtomicI64::new(CLOCK_UNSET),
            reconnect_delay: Duration::ZERO,
        }
    }

    /// Make every reconnect attempt take at least `delay`. Lets tests hold
    /// the reconnect guard open while concurrent probes arrive.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Simulate the remote store going down (`false`) or coming back (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Freeze the expiry clock at an absolute unix timestamp.
    pub fn set_now(&self, unix_ts: i64) {
        self.frozen_now.store(unix_ts, Ordering::SeqCst);
    }

    /// Number of reconnect attempts made against this backend.
    #[must_use]
    pub fn reconnect_attempts(&self) -> usize {
        self.reconnect_attempts.load(Ordering::SeqCst)
    }

    /// Number of key lookups served.
    #[must_use]
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn now(&self) -> i64 {
        match self.frozen_now.load(Ordering::SeqCst) {
            CLOCK_UNSET => chrono::Utc::now().timestamp(),
            frozen => frozen,
        }
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::io("connection refused"))
        }
    }

    fn expired(&self, entry: &Entry) -> bool {
        entry.expires_at.is_some_and(|at| at <= self.now())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }

    async fn reconnect(&self) -> Result<(), StoreError> {
        self.reconnect_attempts.fetch_add(1, Ordering::SeqCst);
        if !self.reconnect_delay.is_zero() {
            tokio::time::sleep(self.reconnect_delay).await;
        }
        self.check_available()
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check_available()?;
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if self.expired(entry) => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check_available()?;
        self.entries.lock().await.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.check_available()?;
        let mut entries = self.entries.lock().await;
        match entries.remove(key) {
            Some(entry) => Ok(!self.expired(&entry)),
            None => Ok(false),
        }
    }

    async fn expire_at(&self, key: &str, unix_ts: i64) -> Result<bool, StoreError> {
        self.check_available()?;
        let mut entries = self.entries.lock().await;
        match entries.get_mut(key) {
            Some(entry) => {
                entry.expires_at = Some(unix_ts);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn keys(&self, pattern: &str) -> Result<HashSet<String>, StoreError> {
        self.check_available()?;
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| entry.expires_at.map_or(true, |at| at > self.now()));
        Ok(entries
            .keys()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect())
    }
}

/// Minimal glob matcher covering the `*` and `?` wildcards Redis patterns use.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    matches_from(&pattern, &text)
}

fn matches_from(pattern: &[char], text: &[char]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some('*') => {
            (0..=text.len()).any(|skip| matches_from(&pattern[1..], &text[skip..]))
        }
        Some('?') => !text.is_empty() && matches_from(&pattern[1..], &text[1..]),
        Some(c) => text.first() == Some(c) && matches_from(&pattern[1..], &text[1..]),
    }
}
