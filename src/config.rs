//! Centralized configuration.
//!
//! All configuration is loaded from environment variables and validated
//! at startup.

use crate::error::ServiceError;
use crate::store::RedisSettings;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Backing store selection.
#[derive(Debug, Clone)]
pub enum StoreProvider {
    /// Redis-backed key store.
    Redis(RedisSettings),
    /// In-process store for development and tests.
    Memory,
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    // Server settings
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,

    // Store settings
    /// Backing store provider
    pub store: StoreProvider,
    /// Store liveness probe cadence
    pub probe_interval: Duration,
    /// Certificate/update check cadence
    pub maintenance_interval: Duration,

    /// Releases endpoint polled for newer versions, if any
    pub releases_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but invalid.
    pub fn from_env() -> Result<Self, ServiceError> {
        dotenvy::dotenv().ok();

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = parse_env("PORT", 8443)?;

        let store = match env::var("STORE_PROVIDER")
            .unwrap_or_else(|_| "redis".to_string())
            .to_lowercase()
            .as_str()
        {
            "memory" => StoreProvider::Memory,
            _ => StoreProvider::Redis(RedisSettings {
                address: env::var("REDIS_ADDRESS").unwrap_or_else(|_| "127.0.0.1".to_string()),
                port: parse_env("REDIS_PORT", 6379)?,
                password: env::var("REDIS_PASSWORD").ok(),
                connect_timeout: Duration::from_millis(parse_env(
                    "REDIS_CONNECT_TIMEOUT_MS",
                    2000,
                )?),
                response_timeout: Duration::from_millis(parse_env(
                    "REDIS_RESPONSE_TIMEOUT_MS",
                    2000,
                )?),
            }),
        };

        let probe_interval = Duration::from_millis(parse_env("DB_CHECK_INTERVAL_MS", 1000)?);
        let maintenance_interval =
            Duration::from_secs(parse_env("MAINTENANCE_INTERVAL_SECS", 43_200)?);
        let releases_url = env::var("RELEASES_URL").ok();

        Ok(Self {
            host,
            port,
            store,
            probe_interval,
            maintenance_interval,
            releases_url,
        })
    }

    /// Socket address to bind the listener to.
    ///
    /// # Errors
    ///
    /// Returns an error if `host` does not parse as an address.
    pub fn listen_addr(&self) -> Result<SocketAddr, ServiceError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ServiceError::config(format!("Invalid listen address: {}", e)))
    }
}

/// Parse environment variable with default value.
fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ServiceError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val
            .parse()
            .map_err(|e| ServiceError::config(format!("Invalid {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}
