//! Redis cache store (`redis` feature).

use async_trait::async_trait;
use log::info;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde_json::Value;

use super::store::CacheStore;
use crate::errors::CacheError;

/// Cache store backed by a Redis server.
///
/// Holds one multiplexed connection; every call works on a cheap clone of
/// it, so the store can be shared across tasks.
#[derive(Clone)]
pub struct RedisCacheStore {
    connection: MultiplexedConnection,
}

impl RedisCacheStore {
    /// Connect to `url` (e.g. `redis://localhost:6379/0`) and verify the
    /// server answers `PING`.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let mut connection = client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut connection).await?;
        info!("Connected to Redis cache at {}", url);
        Ok(Self { connection })
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let mut conn = self.connection.clone();
        let payload: Option<String> = conn.get(key).await?;
        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &Value, ttl_secs: u64) -> Result<(), CacheError> {
        let payload = serde_json::to_string(value)?;
        let mut conn = self.connection.clone();
        if ttl_secs > 0 {
            let _: () = conn.set_ex(key, payload, ttl_secs).await?;
        } else {
            let _: () = conn.set(key, payload).await?;
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.connection.clone();
        Ok(conn.exists(key).await?)
    }

    async fn ttl(&self, key: &str) -> Result<i64, CacheError> {
        let mut conn = self.connection.clone();
        Ok(conn.ttl(key).await?)
    }
}
