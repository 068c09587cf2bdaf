//! Cache module.
//!
//! This module provides:
//! - [`CacheStore`]: the key-value store contract with per-key TTL
//! - [`MemoryCacheStore`]: in-process store, always available
//! - `RedisCacheStore`: Redis store behind the `redis` feature
//! - [`CacheAside`]: get-or-compute-and-store adapter with null stripping

mod aside;
mod keys;
mod memory;
#[cfg(feature = "redis")]
mod redis;
mod store;
mod strip;

pub use aside::{CacheAside, LIST_ID};
pub use keys::{cache_key, ALL_PARTITIONS};
pub use memory::MemoryCacheStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisCacheStore;
pub use store::{CacheStore, TTL_MISSING, TTL_NO_EXPIRY};
pub use strip::{is_empty_hit, strip_nulls};
