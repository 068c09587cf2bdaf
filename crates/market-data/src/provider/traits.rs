//! Fetcher trait definition.
//!
//! This module defines the one-method `Fetcher` trait that every upstream
//! source adapter implements.

use async_trait::async_trait;

use crate::errors::FetchError;
use crate::models::{Listing, Market};

/// Trait for upstream list sources.
///
/// A fetcher is stateless from the registry's point of view: it is
/// registered under a name for one category and asked for a list, optionally
/// restricted to one market. It reports failures as either
/// [`FetchError::Unavailable`] (expected, source is down) or
/// [`FetchError::Unexpected`] (anything it did not anticipate).
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use findata_market_data::{FetchError, Fetcher, Listing, Market};
///
/// struct StaticEtfs;
///
/// #[async_trait]
/// impl Fetcher for StaticEtfs {
///     async fn fetch(&self, _market: Option<Market>) -> Result<Vec<Listing>, FetchError> {
///         Ok(vec![Listing::new("510300", "CSI 300 ETF", AssetCategory::Etf)])
///     }
/// }
/// ```
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the current list.
    ///
    /// # Arguments
    ///
    /// * `market` - Restrict the list to one market, or `None` for the whole
    ///   category. Unpartitioned categories always receive `None`.
    ///
    /// # Returns
    ///
    /// The listings on success. An empty list is a valid answer and stops
    /// the fallback chain like any other success.
    async fn fetch(&self, market: Option<Market>) -> Result<Vec<Listing>, FetchError>;
}
