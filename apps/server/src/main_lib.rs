use std::collections::BTreeMap;
use std::sync::Arc;

use findata_market_data::{
    Aggregator, AssetCategory, CacheAside, CacheStore, CategoryService, HttpFetcher,
    MarketDataSettings, MemoryCacheStore, ProviderRegistry, RefreshScheduler,
};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

pub struct AppState {
    pub services: BTreeMap<AssetCategory, Arc<CategoryService>>,
    pub registry: Arc<ProviderRegistry>,
    pub cache: Arc<CacheAside>,
    pub scheduler: Arc<RefreshScheduler>,
    pub settings: MarketDataSettings,
}

impl AppState {
    pub fn service(&self, category: AssetCategory) -> Option<&Arc<CategoryService>> {
        self.services.get(&category)
    }
}

pub fn init_tracing() {
    let log_format = std::env::var("FD_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

/// Registry with one HTTP fetcher per configured endpoint, in configured
/// priority order.
pub fn http_registry(settings: &MarketDataSettings) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for category in AssetCategory::ALL {
        for endpoint in &settings.category(category).fetcher_urls {
            let fetcher = HttpFetcher::new(endpoint.name.clone(), category, endpoint.url.clone());
            registry.register(category, endpoint.name.clone(), Arc::new(fetcher));
        }
    }
    registry.apply_priorities(settings);
    registry
}

pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let registry = http_registry(&config.market_data);
    build_state_with_registry(config, registry).await
}

pub async fn build_state_with_registry(
    config: &Config,
    registry: ProviderRegistry,
) -> anyhow::Result<Arc<AppState>> {
    let settings = config.market_data.clone();
    settings.validate()?;

    let store = build_cache_store(config).await;
    let cache = Arc::new(CacheAside::new(
        store,
        settings.cache_enabled,
        settings.key_prefix.clone(),
    ));
    tracing::info!(
        "Cache {} (namespace: {})",
        if settings.cache_enabled { "enabled" } else { "disabled" },
        settings.key_prefix
    );

    let registry = Arc::new(registry);
    for category in AssetCategory::ALL {
        tracing::info!(
            "{} providers: [{}]",
            category,
            registry.priority(category).join(", ")
        );
    }

    let services = AssetCategory::ALL
        .into_iter()
        .map(|category| {
            let service = CategoryService::new(
                Aggregator::new(category, registry.clone()),
                cache.clone(),
                settings.category(category).cache_ttl_secs,
            );
            (category, Arc::new(service))
        })
        .collect();

    let scheduler = Arc::new(RefreshScheduler::new(
        settings.scheduler_timezone,
        settings.retry_policy(),
    ));

    Ok(Arc::new(AppState {
        services,
        registry,
        cache,
        scheduler,
        settings,
    }))
}

/// Redis when configured and reachable, otherwise the in-memory store.
async fn build_cache_store(config: &Config) -> Arc<dyn CacheStore> {
    match &config.redis_url {
        #[cfg(feature = "redis")]
        Some(url) => match findata_market_data::RedisCacheStore::connect(url).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                tracing::warn!("Redis unavailable ({}), falling back to in-memory cache", e);
                Arc::new(MemoryCacheStore::new())
            }
        },
        #[cfg(not(feature = "redis"))]
        Some(_) => {
            tracing::warn!(
                "FD_REDIS_URL is set but the server was built without the redis feature, using in-memory cache"
            );
            Arc::new(MemoryCacheStore::new())
        }
        None => Arc::new(MemoryCacheStore::new()),
    }
}
