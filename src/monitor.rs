//! Background status monitor.
//!
//! Independent interval tasks that only read core state (store liveness)
//! and signal observers through logs. Nothing here participates in request
//! handling.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::store::KeyStore;

/// Serving-certificate lifecycle, consumed from the surrounding system.
/// The transport owns the certificate; this core only observes it.
pub trait CertificateStatus: Send + Sync {
    /// Whether the serving certificate is currently valid.
    fn is_valid(&self) -> bool;
    /// Certificate expiry instant.
    fn expires_at(&self) -> DateTime<Utc>;
}

/// Software-update availability, consumed from the surrounding system.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Latest released version string, if it could be determined.
    async fn latest_version(&self) -> Option<String>;
}

/// Update source backed by a GitHub-style releases API.
pub struct GithubReleases {
    url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct Release {
    tag_name: String,
}

impl GithubReleases {
    /// Create a source polling `url` for the newest release tag.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl UpdateSource for GithubReleases {
    async fn latest_version(&self) -> Option<String> {
        let response = self
            .client
            .get(&self.url)
            .header(
                reqwest::header::USER_AGENT,
                concat!("keyserver/", env!("CARGO_PKG_VERSION")),
            )
            .send()
            .await
            .ok()?;
        let releases: Vec<Release> = response.json().await.ok()?;
        releases.into_iter().next().map(|release| release.tag_name)
    }
}

/// Intervals for the two monitor tasks.
#[derive(Debug, Clone, Copy)]
pub struct MonitorIntervals {
    /// Store liveness probe cadence.
    pub probe: Duration,
    /// Certificate/update check cadence.
    pub maintenance: Duration,
}

/// Handle over the running monitor tasks.
pub struct Monitor {
    store_available: Arc<AtomicBool>,
    started_at: DateTime<Utc>,
    tasks: Vec<JoinHandle<()>>,
}

impl Monitor {
    /// Spawn the liveness probe task, plus the maintenance task when a
    /// certificate status or update source is wired in.
    pub fn start(
        store: Arc<KeyStore>,
        intervals: MonitorIntervals,
        certificate: Option<Arc<dyn CertificateStatus>>,
        updates: Option<Arc<dyn UpdateSource>>,
    ) -> Self {
        let store_available = Arc::new(AtomicBool::new(true));
        let mut tasks = Vec::new();

        let flag = Arc::clone(&store_available);
        tasks.push(tokio::spawn(async move {
            // Log loss once per outage, recovery once per return.
            let mut lost_notified = false;
            let mut ticker = tokio::time::interval(intervals.probe);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let up = store.is_connected().await;
                flag.store(up, Ordering::SeqCst);
                if !up && !lost_notified {
                    lost_notified = true;
                    error!("Connection lost with the key store; trying to reconnect");
                } else if up && lost_notified {
                    lost_notified = false;
                    info!("Connected to the key store");
                }
            }
        }));

        if certificate.is_some() || updates.is_some() {
            let current = env!("CARGO_PKG_VERSION").to_string();
            tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(intervals.maintenance);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    if let Some(certificate) = &certificate {
                        if !certificate.is_valid() {
                            error!(
                                expires_at = %certificate.expires_at(),
                                "Serving certificate has expired; incoming requests will be rejected"
                            );
                        }
                    }
                    if let Some(updates) = &updates {
                        if let Some(latest) = updates.latest_version().await {
                            if is_newer(&latest, &current) {
                                warn!(%latest, %current, "A newer release is available");
                            }
                        }
                    }
                }
            }));
        }

        Self {
            store_available,
            started_at: Utc::now(),
            tasks,
        }
    }

    /// Last probed store liveness.
    #[must_use]
    pub fn store_available(&self) -> bool {
        self.store_available.load(Ordering::SeqCst)
    }

    /// Instant this monitor (and the service) started.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Running service version.
    #[must_use]
    pub fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Abort the background tasks.
    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Compare dotted numeric versions; a leading `v` on release tags is
/// ignored, missing components count as zero.
fn is_newer(latest: &str, current: &str) -> bool {
    fn components(version: &str) -> Vec<u64> {
        version
            .trim()
            .trim_start_matches('v')
            .split('.')
            .map(|part| part.parse::<u64>().unwrap_or(0))
            .collect()
    }
    components(latest) > components(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;

    #[test]
    fn test_is_newer() {
        assert!(is_newer("0.6.0", "0.5.0"));
        assert!(is_newer("v1.0.0", "0.9.9"));
        assert!(!is_newer("0.5.0", "0.5.0"));
        assert!(!is_newer("v0.4.9", "0.5.0"));
        assert!(is_newer("0.5.0.1", "0.5.0"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_probe_tracks_store_liveness() {
        let backend = Arc::new(MemoryBackend::new());
        let store = Arc::new(KeyStore::new(backend.clone()).await);
        let mut monitor = Monitor::start(
            store,
            MonitorIntervals {
                probe: Duration::from_millis(10),
                maintenance: Duration::from_secs(3600),
            },
            None,
            None,
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(monitor.store_available());

        backend.set_available(false);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!monitor.store_available());

        backend.set_available(true);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(monitor.store_available());

        monitor.stop();
    }

    struct ExpiredCertificate;

    impl CertificateStatus for ExpiredCertificate {
        fn is_valid(&self) -> bool {
            false
        }
        fn expires_at(&self) -> DateTime<Utc> {
            Utc::now() - chrono::Duration::days(1)
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_maintenance_task_spawns_with_certificate() {
        let backend = Arc::new(MemoryBackend::new());
        let store = Arc::new(KeyStore::new(backend).await);
        let mut monitor = Monitor::start(
            store,
            MonitorIntervals {
                probe: Duration::from_millis(10),
                maintenance: Duration::from_millis(10),
            },
            Some(Arc::new(ExpiredCertificate)),
            None,
        );
        // The task must keep running despite the invalid certificate.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(monitor.store_available());
        monitor.stop();
    }
}
