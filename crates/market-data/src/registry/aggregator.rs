//! Fallback aggregator over the fetchers of one category.

use std::borrow::Cow;
use std::sync::Arc;

use log::{debug, error, info, warn};

use super::{FetchDiagnostics, ProviderRegistry};
use crate::errors::{FetchError, MarketDataError};
use crate::models::{AssetCategory, Listing, Market};

/// Tries the fetchers of one category in priority order.
///
/// Fetchers are called strictly one after another so a working primary
/// source is never bypassed. The first success wins, an empty list
/// included. When every fetcher fails the error lists every reason.
#[derive(Clone)]
pub struct Aggregator {
    category: AssetCategory,
    registry: Arc<ProviderRegistry>,
}

impl Aggregator {
    pub fn new(category: AssetCategory, registry: Arc<ProviderRegistry>) -> Self {
        Self { category, registry }
    }

    pub fn category(&self) -> AssetCategory {
        self.category
    }

    /// Fetch the list from the first provider that succeeds.
    ///
    /// # Errors
    ///
    /// [`MarketDataError::ProviderSelection`] with one `"{provider}: {reason}"`
    /// entry per failed provider, in the order they were tried.
    pub async fn get(&self, market: Option<Market>) -> Result<Vec<Listing>, MarketDataError> {
        self.get_with_diagnostics(market).await.0
    }

    /// Fetch the list and return the per-provider attempt log alongside.
    pub async fn get_with_diagnostics(
        &self,
        market: Option<Market>,
    ) -> (Result<Vec<Listing>, MarketDataError>, FetchDiagnostics) {
        let mut diagnostics = FetchDiagnostics::new();

        for (name, fetcher) in self.registry.iterate(self.category) {
            let provider_id = Cow::Owned(name.to_string());
            debug!(
                "Fetching {} list from provider '{}' (market: {:?})",
                self.category, name, market
            );

            match fetcher.fetch(market).await {
                Ok(listings) => {
                    diagnostics.record_success(provider_id);
                    info!(
                        "Fetched {} {} listings from '{}'. Diagnostics: {}",
                        listings.len(),
                        self.category,
                        name,
                        diagnostics.summary()
                    );
                    return (Ok(listings), diagnostics);
                }
                Err(e @ FetchError::Unavailable { .. }) => {
                    warn!(
                        "{}_provider_failed provider={} error={}",
                        self.category, name, e
                    );
                    diagnostics.record_error(provider_id, e.to_string());
                }
                Err(e @ FetchError::Unexpected { .. }) => {
                    error!(
                        "{}_provider_unexpected_error provider={} error={}",
                        self.category, name, e
                    );
                    diagnostics.record_error(provider_id, e.to_string());
                }
            }
        }

        warn!(
            "All {} providers failed. Diagnostics: {}",
            self.category,
            diagnostics.summary()
        );
        let errors = diagnostics.error_messages();
        (Err(MarketDataError::ProviderSelection { errors }), diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Fetcher;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behavior {
        Succeed(Vec<Listing>),
        Unavailable(&'static str),
        Unexpected(&'static str),
    }

    struct MockFetcher {
        behavior: Behavior,
        call_count: AtomicUsize,
    }

    impl MockFetcher {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                call_count: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for MockFetcher {
        async fn fetch(&self, _market: Option<Market>) -> Result<Vec<Listing>, FetchError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Succeed(items) => Ok(items.clone()),
                Behavior::Unavailable(detail) => Err(FetchError::unavailable(*detail)),
                Behavior::Unexpected(message) => Err(FetchError::unexpected(*message)),
            }
        }
    }

    fn item(symbol: &str) -> Listing {
        Listing::new(symbol, symbol, AssetCategory::Stock).with_market(Market::CN)
    }

    fn aggregator(fetchers: &[(&'static str, Arc<MockFetcher>)]) -> Aggregator {
        let mut registry = ProviderRegistry::new();
        for (name, fetcher) in fetchers {
            registry.register(AssetCategory::Stock, *name, fetcher.clone());
        }
        Aggregator::new(AssetCategory::Stock, Arc::new(registry))
    }

    #[tokio::test]
    async fn test_falls_back_to_second_provider() {
        let em = MockFetcher::new(Behavior::Unavailable("connection reset"));
        let sina = MockFetcher::new(Behavior::Succeed(vec![item("600519")]));
        let aggregator = aggregator(&[("em", em.clone()), ("sina", sina.clone())]);

        let (result, diagnostics) = aggregator.get_with_diagnostics(Some(Market::CN)).await;

        assert_eq!(result.unwrap(), vec![item("600519")]);
        assert_eq!(diagnostics.errors().len(), 1);
        assert!(diagnostics.errors()[0].0 == "em");
        assert_eq!(diagnostics.winner().map(|p| p.to_string()), Some("sina".to_string()));
        assert_eq!(em.calls(), 1);
        assert_eq!(sina.calls(), 1);
    }

    #[tokio::test]
    async fn test_first_success_stops_iteration() {
        let a = MockFetcher::new(Behavior::Unexpected("boom"));
        let b = MockFetcher::new(Behavior::Succeed(vec![item("000001")]));
        let c = MockFetcher::new(Behavior::Succeed(vec![item("300750")]));
        let aggregator = aggregator(&[("a", a.clone()), ("b", b.clone()), ("c", c.clone())]);

        let listings = aggregator.get(None).await.unwrap();

        assert_eq!(listings, vec![item("000001")]);
        assert_eq!(c.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_success_is_not_a_failure() {
        let a = MockFetcher::new(Behavior::Succeed(vec![]));
        let b = MockFetcher::new(Behavior::Succeed(vec![item("600000")]));
        let aggregator = aggregator(&[("a", a.clone()), ("b", b.clone())]);

        let listings = aggregator.get(None).await.unwrap();

        assert!(listings.is_empty());
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test]
    async fn test_all_failures_collected_in_priority_order() {
        let a = MockFetcher::new(Behavior::Unavailable("HTTP error: 502 Bad Gateway"));
        let b = MockFetcher::new(Behavior::Unexpected("invalid list payload"));
        let c = MockFetcher::new(Behavior::Unavailable("rate limited"));
        let aggregator = aggregator(&[("a", a), ("b", b), ("c", c)]);

        let err = aggregator.get(None).await.unwrap_err();

        match err {
            MarketDataError::ProviderSelection { errors } => {
                assert_eq!(
                    errors,
                    vec![
                        "a: HTTP error: 502 Bad Gateway",
                        "b: invalid list payload",
                        "c: rate limited",
                    ]
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_providers_yields_empty_selection_error() {
        let aggregator = Aggregator::new(AssetCategory::Fund, Arc::new(ProviderRegistry::new()));

        let err = aggregator.get(None).await.unwrap_err();

        assert_eq!(err.provider_errors(), Some(&[][..]));
        assert_eq!(err.to_string(), "no provider available");
    }
}
