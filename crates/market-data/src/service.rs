//! Cached access to one category list.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};

use crate::cache::CacheAside;
use crate::errors::MarketDataError;
use crate::models::{AssetCategory, Listing, Market};
use crate::refresh::Refresher;
use crate::registry::Aggregator;

/// Binds the aggregator of a category to the cache-aside adapter.
///
/// `list` is the read path used by requests, `refresh` the forced reload
/// the scheduler calls, `invalidate` drops cached lists.
pub struct CategoryService {
    aggregator: Aggregator,
    cache: Arc<CacheAside>,
    ttl_secs: u64,
}

impl CategoryService {
    pub fn new(aggregator: Aggregator, cache: Arc<CacheAside>, ttl_secs: u64) -> Self {
        Self {
            aggregator,
            cache,
            ttl_secs,
        }
    }

    pub fn category(&self) -> AssetCategory {
        self.aggregator.category()
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Markets the category is partitioned by; empty when it is not.
    pub fn partitions(&self) -> &'static [Market] {
        self.category().partitions()
    }

    fn check_market(&self, market: Option<Market>) -> Result<(), MarketDataError> {
        match market {
            Some(market) if !self.category().is_partitioned() => {
                Err(MarketDataError::InvalidMarket(format!(
                    "{} ({} lists are not split by market)",
                    market,
                    self.category()
                )))
            }
            _ => Ok(()),
        }
    }

    /// List the category, from cache when possible.
    ///
    /// For a partitioned category without `market`, every partition is
    /// listed and the results concatenated.
    pub async fn list(&self, market: Option<Market>) -> Result<Vec<Listing>, MarketDataError> {
        self.check_market(market)?;
        let category = self.category();

        if market.is_none() && category.is_partitioned() {
            return self
                .cache
                .get_all_partitions_with_cache(category, self.partitions(), self.ttl_secs, |m| {
                    self.aggregator.get(Some(m))
                })
                .await;
        }

        self.cache
            .get_partition_with_cache(category, market, self.ttl_secs, || {
                self.aggregator.get(market)
            })
            .await
    }

    /// Fetch one partition upstream and overwrite its cache entry.
    ///
    /// An empty result drops the entry instead, so the next read goes
    /// upstream. Returns the number of items fetched.
    pub async fn refresh(&self, market: Option<Market>) -> Result<usize, MarketDataError> {
        self.check_market(market)?;
        let listings = self.aggregator.get(market).await?;
        let key = self.cache.key(self.category(), market);

        if listings.is_empty() {
            debug!(
                "{} refresh returned no items, dropping {}",
                self.category(),
                key
            );
            self.cache.invalidate(&key).await;
            return Ok(0);
        }

        self.cache.put(&key, &listings, self.ttl_secs).await;
        info!(
            "Refreshed {} {} listings into {}",
            listings.len(),
            self.category(),
            key
        );
        Ok(listings.len())
    }

    /// Drop cached lists. Without `market`, every partition is dropped.
    pub async fn invalidate(&self, market: Option<Market>) -> Result<(), MarketDataError> {
        self.check_market(market)?;
        let category = self.category();

        match market {
            Some(market) => self.cache.invalidate(&self.cache.key(category, Some(market))).await,
            None => {
                self.cache.invalidate(&self.cache.key(category, None)).await;
                for &market in self.partitions() {
                    self.cache.invalidate(&self.cache.key(category, Some(market))).await;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Refresher for CategoryService {
    async fn refresh(&self, market: Option<Market>) -> Result<usize, MarketDataError> {
        CategoryService::refresh(self, market).await
    }
}
