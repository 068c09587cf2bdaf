//! Findata Market Data Crate
//!
//! This crate provides a resilience layer between data requests and a set
//! of volatile upstream market-data sources.
//!
//! # Overview
//!
//! The market data crate supports:
//! - Multiple asset categories: stocks (split by market), ETFs, funds
//! - Multiple interchangeable fetchers per category with priority fallback
//! - Cache-aside reads with per-category TTL and null stripping
//! - Cron-scheduled cache refresh with per-partition retries
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! | CategoryService  |  list / refresh / invalidate
//! +------------------+
//!      |         |
//!      v         v
//! +---------+  +------------------+     +------------------+
//! | Cache-  |  |    Aggregator    | --> | ProviderRegistry |  (priority order)
//! | Aside   |  +------------------+     +------------------+
//! +---------+                                   |
//!      |                                        v
//!      v                                +------------------+
//! +------------+                        |     Fetcher      |  (HTTP, ...)
//! | CacheStore |  (memory, Redis)       +------------------+
//! +------------+
//!
//! +------------------+
//! | RefreshScheduler |  cron -> RefreshJob -> Refresher (CategoryService)
//! +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`AssetCategory`] / [`Market`] - What is listed and how it is partitioned
//! - [`Listing`] - One item of a category list
//! - [`Fetcher`] - One upstream source for a category
//! - [`Aggregator`] - First-success fallback over the registered fetchers
//! - [`CacheAside`] - Get-or-compute-and-store over a [`CacheStore`]
//! - [`RefreshScheduler`] - Cron-driven cache warm-up

pub mod cache;
pub mod config;
pub mod errors;
pub mod models;
pub mod provider;
pub mod refresh;
pub mod registry;
pub mod service;

// Re-export all public types from models
pub use models::{AssetCategory, Exchange, Listing, Market, ProviderId};

// Re-export error types
pub use errors::{CacheError, FetchError, MarketDataError, SchedulerError};

// Re-export provider types
pub use provider::http::HttpFetcher;
pub use provider::Fetcher;

// Re-export registry types
pub use registry::{Aggregator, FetchDiagnostics, ProviderAttempt, ProviderRegistry};

// Re-export cache types
#[cfg(feature = "redis")]
pub use cache::RedisCacheStore;
pub use cache::{CacheAside, CacheStore, MemoryCacheStore};

// Re-export refresh types
pub use refresh::{
    CronSchedule, PartitionOutcome, RefreshJob, RefreshReport, RefreshScheduler, Refresher,
    RetryPolicy, SchedulerState, SchedulerTimezone,
};

pub use config::{CategorySettings, FetcherEndpoint, MarketDataSettings};
pub use service::CategoryService;
