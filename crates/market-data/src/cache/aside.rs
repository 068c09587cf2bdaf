//! Cache-aside adapter.
//!
//! Wraps any fetch operation with get-or-compute-and-store semantics. The
//! store is an optimisation only: every store failure is logged and the
//! request carries on as if the cache were empty.

use std::future::Future;
use std::sync::Arc;

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::keys::cache_key;
use super::store::{CacheStore, TTL_MISSING};
use super::strip::{is_empty_hit, strip_nulls};
use crate::models::{AssetCategory, Market};

/// Cache id of a category list.
pub const LIST_ID: &str = "list";

pub struct CacheAside {
    store: Arc<dyn CacheStore>,
    enabled: bool,
    namespace: String,
}

impl CacheAside {
    pub fn new(store: Arc<dyn CacheStore>, enabled: bool, namespace: impl Into<String>) -> Self {
        Self {
            store,
            enabled,
            namespace: namespace.into(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Key of a category list for one partition (or all of them).
    pub fn key(&self, category: AssetCategory, market: Option<Market>) -> String {
        cache_key(&self.namespace, category, market, LIST_ID)
    }

    /// Return the cached value for `key`, or compute it with `fetch` and
    /// store it for `ttl_secs`.
    ///
    /// The value returned on a miss is the one `fetch` produced, before null
    /// stripping. Errors from `fetch` are returned unchanged and nothing is
    /// stored.
    pub async fn get_with_cache<T, E, F, Fut>(
        &self,
        key: &str,
        ttl_secs: u64,
        fetch: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.enabled {
            return fetch().await;
        }

        if let Some(hit) = self.read(key).await {
            return Ok(hit);
        }

        let value = fetch().await?;
        self.write(key, &value, ttl_secs).await;
        Ok(value)
    }

    /// Cache-aside for one partition of a category list.
    ///
    /// Same contract as [`get_with_cache`](Self::get_with_cache), except an
    /// empty result is returned without being stored so the next call goes
    /// upstream again.
    pub async fn get_partition_with_cache<T, E, F, Fut>(
        &self,
        category: AssetCategory,
        market: Option<Market>,
        ttl_secs: u64,
        fetch: F,
    ) -> Result<Vec<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, E>>,
    {
        if !self.enabled {
            return fetch().await;
        }

        let key = self.key(category, market);
        if let Some(hit) = self.read(&key).await {
            return Ok(hit);
        }

        let items = fetch().await?;
        if items.is_empty() {
            debug!("cache_skip_empty key={}", key);
        } else {
            self.write(&key, &items, ttl_secs).await;
        }
        Ok(items)
    }

    /// Cache-aside over several partitions, concatenated in the given order.
    ///
    /// Partitions are fetched one after another. The first partition error
    /// is returned; partitions already fetched stay cached.
    pub async fn get_all_partitions_with_cache<T, E, F, Fut>(
        &self,
        category: AssetCategory,
        partitions: &[Market],
        ttl_secs: u64,
        mut fetch: F,
    ) -> Result<Vec<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut(Market) -> Fut,
        Fut: Future<Output = Result<Vec<T>, E>>,
    {
        let mut all = Vec::new();
        for &market in partitions {
            let items = self
                .get_partition_with_cache(category, Some(market), ttl_secs, || fetch(market))
                .await?;
            all.extend(items);
        }
        Ok(all)
    }

    /// Overwrite `key` unconditionally. Returns whether the value was stored.
    pub async fn put<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) -> bool {
        if !self.enabled {
            return false;
        }
        self.write(key, value, ttl_secs).await
    }

    pub async fn invalidate(&self, key: &str) {
        if !self.enabled {
            return;
        }
        match self.store.delete(key).await {
            Ok(()) => debug!("cache_invalidated key={}", key),
            Err(e) => warn!("cache_delete_failed key={} error={}", key, e),
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        if !self.enabled {
            return false;
        }
        self.store.exists(key).await.unwrap_or_else(|e| {
            warn!("cache_exists_failed key={} error={}", key, e);
            false
        })
    }

    /// Remaining lifetime of `key`; `-2` when absent, unreadable or disabled.
    pub async fn ttl(&self, key: &str) -> i64 {
        if !self.enabled {
            return TTL_MISSING;
        }
        self.store.ttl(key).await.unwrap_or_else(|e| {
            warn!("cache_ttl_failed key={} error={}", key, e);
            TTL_MISSING
        })
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = match self.store.get(key).await {
            Ok(Some(value)) if !is_empty_hit(&value) => value,
            Ok(_) => {
                debug!("cache_miss key={}", key);
                return None;
            }
            Err(e) => {
                warn!("cache_get_failed key={} error={}", key, e);
                return None;
            }
        };

        match serde_json::from_value(value) {
            Ok(hit) => {
                debug!("cache_hit key={}", key);
                Some(hit)
            }
            Err(e) => {
                warn!("cache_decode_failed key={} error={}", key, e);
                None
            }
        }
    }

    async fn write<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) -> bool {
        let value: Value = match serde_json::to_value(value) {
            Ok(value) => strip_nulls(value),
            Err(e) => {
                warn!("cache_encode_failed key={} error={}", key, e);
                return false;
            }
        };

        match self.store.set(key, &value, ttl_secs).await {
            Ok(()) => {
                debug!("cache_set key={} ttl={}", key, ttl_secs);
                true
            }
            Err(e) => {
                warn!("cache_set_failed key={} error={}", key, e);
                false
            }
        }
    }
}
