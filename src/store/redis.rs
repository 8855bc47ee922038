//! Redis backend speaking the get/set/expireat/keys/del verb set.
//!
//! The connection is an explicitly owned multiplexed connection rather than
//! a self-healing manager: reconnection is driven by [`super::KeyStore`]'s
//! guarded probe so that at most one reconnect is ever in flight.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use super::{StoreBackend, StoreError};

/// Connection settings for the Redis backend.
#[derive(Debug, Clone)]
pub struct RedisSettings {
    /// Store address (hostname or IP).
    pub address: String,
    /// Store port.
    pub port: u16,
    /// Optional AUTH password.
    pub password: Option<String>,
    /// Bound on establishing a connection.
    pub connect_timeout: Duration,
    /// Bound on any single command round-trip.
    pub response_timeout: Duration,
}

impl RedisSettings {
    fn url(&self) -> String {
        match &self.password {
            Some(password) => format!("redis://:{}@{}:{}/", password, self.address, self.port),
            None => format!("redis://{}:{}/", self.address, self.port),
        }
    }
}

/// Redis-backed [`StoreBackend`].
pub struct RedisBackend {
    client: Client,
    settings: RedisSettings,
    conn: RwLock<Option<MultiplexedConnection>>,
}

impl RedisBackend {
    /// Build the backend. No I/O happens here; the first
    /// [`StoreBackend::reconnect`] establishes the connection.
    pub fn new(settings: RedisSettings) -> Result<Self, StoreError> {
        let client = Client::open(settings.url()).map_err(|e| StoreError::io(e.to_string()))?;
        Ok(Self {
            client,
            settings,
            conn: RwLock::new(None),
        })
    }

    async fn current(&self) -> Result<MultiplexedConnection, StoreError> {
        self.conn
            .read()
            .await
            .clone()
            .ok_or(StoreError::NotConnected)
    }
}

#[async_trait]
impl StoreBackend for RedisBackend {
    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.current().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| StoreError::io(e.to_string()))?;
        Ok(())
    }

    async fn reconnect(&self) -> Result<(), StoreError> {
        let conn = self
            .client
            .get_multiplexed_async_connection_with_timeouts(
                self.settings.response_timeout,
                self.settings.connect_timeout,
            )
            .await
            .map_err(|e| StoreError::io(e.to_string()))?;
        *self.conn.write().await = Some(conn);
        debug!(address = %self.settings.address, port = self.settings.port, "Redis connection established");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.current().await?;
        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| StoreError::io(e.to_string()))?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.current().await?;
        conn.set::<_, _, ()>(key, value)
            .await
            .map_err(|e| StoreError::io(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.current().await?;
        let removed: i64 = conn
            .del(key)
            .await
            .map_err(|e| StoreError::io(e.to_string()))?;
        Ok(removed > 0)
    }

    async fn expire_at(&self, key: &str, unix_ts: i64) -> Result<bool, StoreError> {
        let mut conn = self.current().await?;
        let set: bool = conn
            .expire_at(key, unix_ts)
            .await
            .map_err(|e| StoreError::io(e.to_string()))?;
        Ok(set)
    }

    async fn keys(&self, pattern: &str) -> Result<HashSet<String>, StoreError> {
        let mut conn = self.current().await?;
        let keys: HashSet<String> = conn
            .keys(pattern)
            .await
            .map_err(|e| StoreError::io(e.to_string()))?;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(password: Option<&str>) -> RedisSettings {
        RedisSettings {
            address: "127.0.0.1".to_string(),
            port: 6379,
            password: password.map(String::from),
            connect_timeout: Duration::from_secs(2),
            response_timeout: Duration::from_secs(2),
        }
    }

    #[test]
    fn test_url_without_password() {
        assert_eq!(settings(None).url(), "redis://127.0.0.1:6379/");
    }

    #[test]
    fn test_url_with_password() {
        assert_eq!(settings(Some("s3cret")).url(), "redis://:s3cret@127.0.0.1:6379/");
    }

    #[tokio::test]
    async fn test_operations_fail_before_connect() {
        let backend = RedisBackend::new(settings(None)).unwrap();
        assert!(matches!(backend.ping().await, Err(StoreError::NotConnected)));
        assert!(matches!(backend.get("fp").await, Err(StoreError::NotConnected)));
    }
}
