use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use keyserver::config::{Config, StoreProvider};
use keyserver::monitor::{GithubReleases, Monitor, MonitorIntervals, UpdateSource};
use keyserver::store::{KeyStore, MemoryBackend, RedisBackend, StoreBackend};
use keyserver::{server, RequestHandler, ServiceError};

#[tokio::main]
async fn main() -> Result<(), ServiceError> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    info!("Starting key server");

    let config = Config::from_env()?;
    let addr = config.listen_addr()?;

    let backend: Arc<dyn StoreBackend> = match &config.store {
        StoreProvider::Redis(settings) => Arc::new(RedisBackend::new(settings.clone())?),
        StoreProvider::Memory => Arc::new(MemoryBackend::new()),
    };
    let store = Arc::new(KeyStore::new(backend).await);
    let handler = Arc::new(RequestHandler::new(Arc::clone(&store)));

    let updates: Option<Arc<dyn UpdateSource>> = config
        .releases_url
        .as_deref()
        .map(|url| Arc::new(GithubReleases::new(url)) as Arc<dyn UpdateSource>);
    let mut monitor = Monitor::start(
        Arc::clone(&store),
        MonitorIntervals {
            probe: config.probe_interval,
            maintenance: config.maintenance_interval,
        },
        None,
        updates,
    );

    info!(%addr, started_at = %monitor.started_at(), "Key server ready");

    tokio::select! {
        result = server::run(addr, handler) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    monitor.stop();
    Ok(())
}
