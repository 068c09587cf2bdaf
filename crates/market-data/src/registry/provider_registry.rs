//! Provider registry holding the fetchers of every asset category.
//!
//! The registry is built once at start-up (`register`, `set_priority`) and
//! then shared read-only behind an `Arc`. Iteration always yields every
//! registered fetcher exactly once, in priority order.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info};

use crate::config::MarketDataSettings;
use crate::models::{AssetCategory, ProviderId};
use crate::provider::Fetcher;

/// Fetchers and priority of a single category.
#[derive(Default)]
struct CategoryProviders {
    /// Registered fetchers in registration order.
    fetchers: Vec<(ProviderId, Arc<dyn Fetcher>)>,
    /// Names in the order they are tried. Always a permutation of `fetchers`.
    priority: Vec<ProviderId>,
}

impl CategoryProviders {
    fn get(&self, name: &str) -> Option<&Arc<dyn Fetcher>> {
        self.fetchers
            .iter()
            .find(|(id, _)| id == name)
            .map(|(_, fetcher)| fetcher)
    }

    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

/// Registry of named fetchers per asset category.
#[derive(Default)]
pub struct ProviderRegistry {
    categories: HashMap<AssetCategory, CategoryProviders>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fetcher for a category.
    ///
    /// Re-registering an existing name replaces the fetcher in place and
    /// keeps its position in the priority order. New names are appended.
    pub fn register(
        &mut self,
        category: AssetCategory,
        name: impl Into<ProviderId>,
        fetcher: Arc<dyn Fetcher>,
    ) {
        let name = name.into();
        let providers = self.categories.entry(category).or_default();

        match providers.fetchers.iter_mut().find(|(id, _)| *id == name) {
            Some(slot) => {
                debug!("Replacing fetcher '{}' for category {}", name, category);
                slot.1 = fetcher;
            }
            None => {
                debug!("Registering fetcher '{}' for category {}", name, category);
                providers.fetchers.push((name.clone(), fetcher));
            }
        }

        if !providers.priority.contains(&name) {
            providers.priority.push(name);
        }
    }

    /// Set the priority order of a category.
    ///
    /// Unknown names are dropped, duplicates keep their first position, and
    /// registered names missing from `names` are appended in registration
    /// order. No registered fetcher is ever removed from iteration.
    pub fn set_priority<I, S>(&mut self, category: AssetCategory, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let Some(providers) = self.categories.get_mut(&category) else {
            debug!("Ignoring priority for category {} without fetchers", category);
            return;
        };

        let mut priority: Vec<ProviderId> = Vec::with_capacity(providers.fetchers.len());
        for name in names {
            let name = name.as_ref().trim();
            if providers.contains(name) && !priority.iter().any(|p| p == name) {
                priority.push(Cow::Owned(name.to_string()));
            }
        }
        for (id, _) in &providers.fetchers {
            if !priority.contains(id) {
                priority.push(id.clone());
            }
        }

        info!(
            "Provider priority for {}: [{}]",
            category,
            priority.join(", ")
        );
        providers.priority = priority;
    }

    /// Apply the configured priority list of every category that has one.
    pub fn apply_priorities(&mut self, settings: &MarketDataSettings) {
        for category in AssetCategory::ALL {
            let priority = &settings.category(category).provider_priority;
            if !priority.is_empty() {
                self.set_priority(category, priority);
            }
        }
    }

    /// Iterate the fetchers of a category in priority order.
    ///
    /// Side-effect free. A category without fetchers yields nothing.
    pub fn iterate(
        &self,
        category: AssetCategory,
    ) -> impl Iterator<Item = (&str, &Arc<dyn Fetcher>)> + '_ {
        self.categories.get(&category).into_iter().flat_map(|providers| {
            providers
                .priority
                .iter()
                .filter_map(move |name| providers.get(name).map(|f| (name.as_ref(), f)))
        })
    }

    /// Current priority order of a category.
    pub fn priority(&self, category: AssetCategory) -> Vec<String> {
        self.iterate(category)
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// Number of fetchers registered for a category.
    pub fn len(&self, category: AssetCategory) -> usize {
        self.categories
            .get(&category)
            .map_or(0, |providers| providers.fetchers.len())
    }

    pub fn is_empty(&self) -> bool {
        self.categories.values().all(|p| p.fetchers.is_empty())
    }

    /// Categories that have at least one fetcher, in declaration order.
    pub fn categories(&self) -> Vec<AssetCategory> {
        AssetCategory::ALL
            .into_iter()
            .filter(|c| self.len(*c) > 0)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FetchError;
    use crate::models::{Listing, Market};
    use async_trait::async_trait;

    struct NamedFetcher(&'static str);

    #[async_trait]
    impl Fetcher for NamedFetcher {
        async fn fetch(&self, _market: Option<Market>) -> Result<Vec<Listing>, FetchError> {
            Ok(vec![Listing::new(self.0, self.0, AssetCategory::Etf)])
        }
    }

    fn registry_with(names: &[&'static str]) -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        for name in names {
            registry.register(AssetCategory::Etf, *name, Arc::new(NamedFetcher(*name)));
        }
        registry
    }

    #[test]
    fn test_registration_order_is_default_priority() {
        let registry = registry_with(&["a", "b", "c"]);
        assert_eq!(registry.priority(AssetCategory::Etf), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_set_priority_reorders() {
        let mut registry = registry_with(&["a", "b"]);
        registry.set_priority(AssetCategory::Etf, ["b", "a"]);
        assert_eq!(registry.priority(AssetCategory::Etf), vec!["b", "a"]);
    }

    #[test]
    fn test_set_priority_drops_unknown_names() {
        let mut registry = registry_with(&["a", "b"]);
        registry.set_priority(AssetCategory::Etf, ["z"]);
        assert_eq!(registry.priority(AssetCategory::Etf), vec!["a", "b"]);
    }

    #[test]
    fn test_set_priority_appends_unlisted_in_registration_order() {
        let mut registry = registry_with(&["a", "b", "c", "d"]);
        registry.set_priority(AssetCategory::Etf, ["c", "x", "c", "a"]);
        assert_eq!(
            registry.priority(AssetCategory::Etf),
            vec!["c", "a", "b", "d"]
        );
    }

    #[test]
    fn test_reregister_replaces_without_duplicating() {
        let mut registry = registry_with(&["a", "b"]);
        registry.set_priority(AssetCategory::Etf, ["b", "a"]);
        registry.register(AssetCategory::Etf, "a", Arc::new(NamedFetcher("a2")));

        assert_eq!(registry.len(AssetCategory::Etf), 2);
        assert_eq!(registry.priority(AssetCategory::Etf), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_reregister_uses_new_fetcher() {
        let mut registry = registry_with(&["a"]);
        registry.register(AssetCategory::Etf, "a", Arc::new(NamedFetcher("a2")));

        let (_, fetcher) = registry.iterate(AssetCategory::Etf).next().unwrap();
        let listings = fetcher.fetch(None).await.unwrap();
        assert_eq!(listings[0].symbol, "a2");
    }

    #[test]
    fn test_empty_category_iterates_nothing() {
        let mut registry = registry_with(&["a"]);
        assert_eq!(registry.iterate(AssetCategory::Fund).count(), 0);

        registry.set_priority(AssetCategory::Fund, ["a"]);
        assert_eq!(registry.iterate(AssetCategory::Fund).count(), 0);
        assert_eq!(registry.categories(), vec![AssetCategory::Etf]);
    }

    #[test]
    fn test_apply_priorities_from_settings() {
        let mut registry = registry_with(&["a", "b", "c"]);
        let mut settings = MarketDataSettings::default();
        settings.etf.provider_priority = vec!["c".to_string(), "a".to_string()];

        registry.apply_priorities(&settings);

        assert_eq!(registry.priority(AssetCategory::Etf), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_categories_are_independent() {
        let mut registry = registry_with(&["a", "b"]);
        registry.register(AssetCategory::Stock, "b", Arc::new(NamedFetcher("b")));
        registry.set_priority(AssetCategory::Stock, ["b"]);
        registry.set_priority(AssetCategory::Etf, ["b", "a"]);

        assert_eq!(registry.priority(AssetCategory::Stock), vec!["b"]);
        assert_eq!(registry.priority(AssetCategory::Etf), vec!["b", "a"]);
        assert!(!registry.is_empty());
    }
}
