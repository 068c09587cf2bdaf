//! Settings for the market data layer.
//!
//! Every value has a default; [`MarketDataSettings::from_env`] overrides them
//! from `FD_*` environment variables:
//!
//! | Variable | Default |
//! |----------|---------|
//! | `FD_CACHE_ENABLED` | `true` |
//! | `FD_CACHE_KEY_PREFIX` | `findata` |
//! | `FD_REFRESH_RETRY_TIMES` | `3` |
//! | `FD_REFRESH_BACKOFF_SECS` | `5` |
//! | `FD_SCHEDULER_TZ` | `utc` |
//! | `FD_{STOCK,ETF,FUND}_CACHE_TTL` | `86400` / `3600` / `3600` |
//! | `FD_{STOCK,ETF,FUND}_REFRESH_CRON` | `0 2 * * *` / `0 3 * * *` / `0 4 * * *` |
//! | `FD_{STOCK,ETF,FUND}_PROVIDER_PRIORITY` | registration order |
//! | `FD_{STOCK,ETF,FUND}_FETCHER_URLS` | none (`name=url,name=url`) |

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::MarketDataError;
use crate::models::AssetCategory;
use crate::refresh::{CronSchedule, RetryPolicy, SchedulerTimezone};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "FD_";

/// A named upstream endpoint served by an HTTP fetcher.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetcherEndpoint {
    pub name: String,
    pub url: String,
}

/// Settings of one asset category.
///
/// Inside [`MarketDataSettings`] a section may give only some fields; the
/// rest come from [`CategorySettings::defaults_for`] of that category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySettings {
    /// Cache lifetime of a list, in seconds. `0` keeps entries forever.
    pub cache_ttl_secs: u64,
    pub refresh_cron: String,
    /// Provider names in the order they are tried
    #[serde(default)]
    pub provider_priority: Vec<String>,
    #[serde(default)]
    pub fetcher_urls: Vec<FetcherEndpoint>,
}

impl CategorySettings {
    pub fn defaults_for(category: AssetCategory) -> Self {
        let (cache_ttl_secs, refresh_cron) = match category {
            AssetCategory::Stock => (86_400, "0 2 * * *"),
            AssetCategory::Etf => (3_600, "0 3 * * *"),
            AssetCategory::Fund => (3_600, "0 4 * * *"),
        };
        Self {
            cache_ttl_secs,
            refresh_cron: refresh_cron.to_string(),
            provider_priority: Vec::new(),
            fetcher_urls: Vec::new(),
        }
    }
}

/// A category section as written in a settings document.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CategoryOverrides {
    cache_ttl_secs: Option<u64>,
    refresh_cron: Option<String>,
    provider_priority: Option<Vec<String>>,
    fetcher_urls: Option<Vec<FetcherEndpoint>>,
}

impl CategoryOverrides {
    fn apply(self, category: AssetCategory) -> CategorySettings {
        let defaults = CategorySettings::defaults_for(category);
        CategorySettings {
            cache_ttl_secs: self.cache_ttl_secs.unwrap_or(defaults.cache_ttl_secs),
            refresh_cron: self.refresh_cron.unwrap_or(defaults.refresh_cron),
            provider_priority: self.provider_priority.unwrap_or(defaults.provider_priority),
            fetcher_urls: self.fetcher_urls.unwrap_or(defaults.fetcher_urls),
        }
    }
}

fn deserialize_section<'de, D>(
    deserializer: D,
    category: AssetCategory,
) -> Result<CategorySettings, D::Error>
where
    D: Deserializer<'de>,
{
    CategoryOverrides::deserialize(deserializer).map(|o| o.apply(category))
}

fn stock_section<'de, D: Deserializer<'de>>(d: D) -> Result<CategorySettings, D::Error> {
    deserialize_section(d, AssetCategory::Stock)
}

fn etf_section<'de, D: Deserializer<'de>>(d: D) -> Result<CategorySettings, D::Error> {
    deserialize_section(d, AssetCategory::Etf)
}

fn fund_section<'de, D: Deserializer<'de>>(d: D) -> Result<CategorySettings, D::Error> {
    deserialize_section(d, AssetCategory::Fund)
}

/// Settings of the whole market data layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MarketDataSettings {
    pub cache_enabled: bool,
    /// Namespace prepended to every cache key
    pub key_prefix: String,
    /// Attempts per partition in a scheduled refresh
    pub retry_times: u32,
    pub retry_backoff_secs: u64,
    pub scheduler_timezone: SchedulerTimezone,
    #[serde(deserialize_with = "stock_section")]
    pub stock: CategorySettings,
    #[serde(deserialize_with = "etf_section")]
    pub etf: CategorySettings,
    #[serde(deserialize_with = "fund_section")]
    pub fund: CategorySettings,
}

impl Default for MarketDataSettings {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            key_prefix: "findata".to_string(),
            retry_times: 3,
            retry_backoff_secs: 5,
            scheduler_timezone: SchedulerTimezone::Utc,
            stock: CategorySettings::defaults_for(AssetCategory::Stock),
            etf: CategorySettings::defaults_for(AssetCategory::Etf),
            fund: CategorySettings::defaults_for(AssetCategory::Fund),
        }
    }
}

impl MarketDataSettings {
    /// Defaults overridden by `FD_*` environment variables.
    pub fn from_env() -> Result<Self, MarketDataError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `FD_*` name.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, MarketDataError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut settings = Self::default();

        if let Some(value) = get("CACHE_ENABLED") {
            settings.cache_enabled = parse_bool("CACHE_ENABLED", &value)?;
        }
        if let Some(value) = get("CACHE_KEY_PREFIX") {
            settings.key_prefix = value;
        }
        if let Some(value) = get("REFRESH_RETRY_TIMES") {
            settings.retry_times = parse_number("REFRESH_RETRY_TIMES", &value)?;
        }
        if let Some(value) = get("REFRESH_BACKOFF_SECS") {
            settings.retry_backoff_secs = parse_number("REFRESH_BACKOFF_SECS", &value)?;
        }
        if let Some(value) = get("SCHEDULER_TZ") {
            settings.scheduler_timezone = value.parse()?;
        }

        for category in AssetCategory::ALL {
            let prefix = category.as_str().to_ascii_uppercase();
            let var = |suffix: &str| format!("{}_{}", prefix, suffix);
            let section = settings.category_mut(category);

            if let Some(value) = get(&var("CACHE_TTL")) {
                section.cache_ttl_secs = parse_number(&var("CACHE_TTL"), &value)?;
            }
            if let Some(value) = get(&var("REFRESH_CRON")) {
                section.refresh_cron = value;
            }
            if let Some(value) = get(&var("PROVIDER_PRIORITY")) {
                section.provider_priority = split_list(&value).map(str::to_string).collect();
            }
            if let Some(value) = get(&var("FETCHER_URLS")) {
                section.fetcher_urls = parse_endpoints(&var("FETCHER_URLS"), &value)?;
            }
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn category(&self, category: AssetCategory) -> &CategorySettings {
        match category {
            AssetCategory::Stock => &self.stock,
            AssetCategory::Etf => &self.etf,
            AssetCategory::Fund => &self.fund,
        }
    }

    pub fn category_mut(&mut self, category: AssetCategory) -> &mut CategorySettings {
        match category {
            AssetCategory::Stock => &mut self.stock,
            AssetCategory::Etf => &mut self.etf,
            AssetCategory::Fund => &mut self.fund,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_times,
            Duration::from_secs(self.retry_backoff_secs),
        )
    }

    /// Check cron expressions and fetcher endpoints.
    pub fn validate(&self) -> Result<(), MarketDataError> {
        if self.key_prefix.is_empty() {
            return Err(MarketDataError::Config(
                "cache key prefix must not be empty".to_string(),
            ));
        }

        for category in AssetCategory::ALL {
            let section = self.category(category);
            CronSchedule::from_str(&section.refresh_cron)?;

            for endpoint in &section.fetcher_urls {
                if endpoint.name.is_empty() || endpoint.url.is_empty() {
                    return Err(MarketDataError::Config(format!(
                        "{} fetcher endpoints need both a name and a url",
                        category
                    )));
                }
            }
        }
        Ok(())
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_bool(name: &str, value: &str) -> Result<bool, MarketDataError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(name, value)),
    }
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> Result<T, MarketDataError> {
    value.parse().map_err(|_| invalid(name, value))
}

fn parse_endpoints(name: &str, value: &str) -> Result<Vec<FetcherEndpoint>, MarketDataError> {
    split_list(value)
        .map(|entry| {
            let (provider, url) = entry.split_once('=').ok_or_else(|| invalid(name, entry))?;
            Ok(FetcherEndpoint {
                name: provider.trim().to_string(),
                url: url.trim().to_string(),
            })
        })
        .collect()
}

fn invalid(name: &str, value: &str) -> MarketDataError {
    MarketDataError::Config(format!("{}{}: invalid value '{}'", ENV_PREFIX, name, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<MarketDataSettings, MarketDataError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        MarketDataSettings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings(&[]).unwrap();
        assert_eq!(settings, MarketDataSettings::default());
        assert!(settings.cache_enabled);
        assert_eq!(settings.stock.cache_ttl_secs, 86_400);
        assert_eq!(settings.fund.refresh_cron, "0 4 * * *");
        assert_eq!(settings.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_overrides() {
        let settings = settings(&[
            ("FD_CACHE_ENABLED", "off"),
            ("FD_CACHE_KEY_PREFIX", "fd-test"),
            ("FD_REFRESH_RETRY_TIMES", "5"),
            ("FD_SCHEDULER_TZ", "local"),
            ("FD_ETF_CACHE_TTL", "120"),
            ("FD_STOCK_PROVIDER_PRIORITY", " sina , em ,"),
            (
                "FD_STOCK_FETCHER_URLS",
                "em=http://scraper:9000/em?kind=stock, sina=http://scraper:9000/sina",
            ),
        ])
        .unwrap();

        assert!(!settings.cache_enabled);
        assert_eq!(settings.key_prefix, "fd-test");
        assert_eq!(settings.retry_policy().max_attempts, 5);
        assert_eq!(settings.scheduler_timezone, SchedulerTimezone::Local);
        assert_eq!(settings.etf.cache_ttl_secs, 120);
        assert_eq!(settings.stock.provider_priority, vec!["sina", "em"]);
        assert_eq!(
            settings.stock.fetcher_urls[0],
            FetcherEndpoint {
                name: "em".to_string(),
                url: "http://scraper:9000/em?kind=stock".to_string(),
            }
        );
        assert_eq!(settings.stock.fetcher_urls.len(), 2);
    }

    #[test]
    fn test_invalid_values() {
        assert!(settings(&[("FD_CACHE_ENABLED", "maybe")]).is_err());
        assert!(settings(&[("FD_FUND_CACHE_TTL", "-1")]).is_err());
        assert!(settings(&[("FD_ETF_FETCHER_URLS", "no-equals-sign")]).is_err());
        assert!(settings(&[("FD_SCHEDULER_TZ", "mars")]).is_err());

        let err = settings(&[("FD_STOCK_REFRESH_CRON", "0 2 * *")]).unwrap_err();
        assert!(matches!(err, MarketDataError::Scheduler(_)));
    }

    #[test]
    fn test_deserialize_partial_json() {
        let settings: MarketDataSettings = serde_json::from_value(serde_json::json!({
            "cacheEnabled": false,
            "stock": { "cacheTtlSecs": 60 },
            "fund": { "providerPriority": ["em"] }
        }))
        .unwrap();

        assert!(!settings.cache_enabled);
        assert_eq!(settings.stock.cache_ttl_secs, 60);
        assert_eq!(settings.stock.refresh_cron, "0 2 * * *");
        assert_eq!(settings.fund.refresh_cron, "0 4 * * *");
        assert_eq!(settings.fund.cache_ttl_secs, 3_600);
        assert_eq!(settings.fund.provider_priority, vec!["em"]);
        assert_eq!(settings.etf, CategorySettings::defaults_for(AssetCategory::Etf));
    }

    #[test]
    fn test_serialized_settings_round_trip() {
        let mut expected = MarketDataSettings::default();
        expected.stock.refresh_cron = "30 1 * * 1-5".to_string();

        let value = serde_json::to_value(&expected).unwrap();
        let parsed: MarketDataSettings = serde_json::from_value(value).unwrap();

        assert_eq!(parsed, expected);
    }
}
