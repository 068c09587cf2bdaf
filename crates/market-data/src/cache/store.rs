//! Cache store abstraction.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::CacheError;

/// `ttl` result for a key that exists but never expires.
pub const TTL_NO_EXPIRY: i64 = -1;

/// `ttl` result for a key that does not exist.
pub const TTL_MISSING: i64 = -2;

/// Key-value store with per-key expiry.
///
/// Values are JSON documents. A `ttl_secs` of `0` stores the value without
/// expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    async fn set(&self, key: &str, value: &Value, ttl_secs: u64) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Remaining lifetime in seconds, [`TTL_NO_EXPIRY`] or [`TTL_MISSING`].
    async fn ttl(&self, key: &str) -> Result<i64, CacheError>;
}
