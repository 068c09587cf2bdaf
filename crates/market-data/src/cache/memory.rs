//! In-process cache store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use serde_json::Value;
use tokio::time::Instant;

use super::store::{CacheStore, TTL_MISSING, TTL_NO_EXPIRY};
use crate::errors::CacheError;

struct Entry {
    /// Serialized JSON, so reads behave like a remote store
    payload: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Cache store backed by a `HashMap`.
///
/// Expired entries are dropped lazily on access, or in bulk with
/// [`purge_expired`](Self::purge_expired). Uses tokio's clock so paused-time
/// tests can advance expiry.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!("Memory cache mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock_entries()
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry and return how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock_entries();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        before - entries.len()
    }

    /// Run `f` on the live entry for `key`, removing it first if it expired.
    fn with_live<R>(&self, key: &str, f: impl FnOnce(Option<&Entry>) -> R) -> R {
        let now = Instant::now();
        let mut entries = self.lock_entries();
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
        }
        f(entries.get(key))
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let payload = self.with_live(key, |entry| entry.map(|e| e.payload.clone()));
        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &Value, ttl_secs: u64) -> Result<(), CacheError> {
        let payload = serde_json::to_string(value)?;
        let expires_at = (ttl_secs > 0).then(|| Instant::now() + Duration::from_secs(ttl_secs));
        self.lock_entries()
            .insert(key.to_string(), Entry { payload, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.lock_entries().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.with_live(key, |entry| entry.is_some()))
    }

    async fn ttl(&self, key: &str) -> Result<i64, CacheError> {
        let now = Instant::now();
        Ok(self.with_live(key, |entry| match entry {
            None => TTL_MISSING,
            Some(Entry {
                expires_at: None, ..
            }) => TTL_NO_EXPIRY,
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => {
                let millis = at.saturating_duration_since(now).as_millis();
                ((millis + 500) / 1000) as i64
            }
        }))
    }
}
