//! HTTP JSON fetcher.
//!
//! Fetches a category list from an upstream JSON endpoint. The endpoint is
//! expected to answer `GET {url}` (plus `?market={CN|HK|US}` for partitioned
//! categories) with either a bare array of items or an envelope
//! `{"data": [...]}`.
//!
//! # Error mapping
//!
//! | Condition | Result |
//! |-----------|--------|
//! | Transport failure, timeout | `Unavailable` |
//! | HTTP 429 | `Unavailable` ("rate limited") |
//! | Other non-2xx status | `Unavailable` ("HTTP error: ...") |
//! | Body is not the expected JSON | `Unexpected` |

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

use crate::errors::FetchError;
use crate::models::{AssetCategory, Exchange, Listing, Market};
use crate::provider::Fetcher;

/// Default HTTP request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Item as returned by upstream endpoints.
///
/// Accepts both camelCase and snake_case field names. An unknown `market`
/// or `exchange` value is dropped rather than failing the list.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteListing {
    symbol: String,
    name: String,
    #[serde(default, deserialize_with = "lenient")]
    market: Option<Market>,
    #[serde(default, deserialize_with = "lenient")]
    exchange: Option<Exchange>,
    #[serde(default, alias = "fund_type")]
    fund_type: Option<String>,
    #[serde(default, alias = "pinyin_initial")]
    pinyin_initial: Option<String>,
    #[serde(default, alias = "pinyin_full")]
    pinyin_full: Option<String>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListResponse {
    Bare(Vec<RemoteListing>),
    Envelope { data: Vec<RemoteListing> },
}

impl ListResponse {
    fn into_items(self) -> Vec<RemoteListing> {
        match self {
            Self::Bare(items) | Self::Envelope { data: items } => items,
        }
    }
}

/// Fetcher backed by an upstream HTTP JSON endpoint.
///
/// # Example
///
/// ```ignore
/// let fetcher = HttpFetcher::new("em", AssetCategory::Stock, "http://scraper:9000/stock/list");
/// let listings = fetcher.fetch(Some(Market::HK)).await?;
/// ```
pub struct HttpFetcher {
    client: Client,
    name: String,
    category: AssetCategory,
    url: String,
}

impl HttpFetcher {
    pub fn new(name: impl Into<String>, category: AssetCategory, url: impl Into<String>) -> Self {
        Self::with_timeout(name, category, url, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        name: impl Into<String>,
        category: AssetCategory,
        url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            name: name.into(),
            category,
            url: url.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn get_body(&self, market: Option<Market>) -> Result<String, FetchError> {
        let mut request = self.client.get(&self.url);
        if let Some(market) = market {
            request = request.query(&[("market", market.as_str())]);
        }

        debug!(provider = %self.name, url = %self.url, ?market, "Fetching list");

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::unavailable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::unavailable("rate limited"));
        }

        if !response.status().is_success() {
            return Err(FetchError::unavailable(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::unavailable(e.to_string()))
    }

    fn parse_body(&self, body: &str, market: Option<Market>) -> Result<Vec<Listing>, FetchError> {
        let parsed: ListResponse = serde_json::from_str(body).map_err(|e| {
            warn!(provider = %self.name, error = %e, "Unrecognised list payload");
            FetchError::unexpected(format!("invalid list payload: {}", e))
        })?;

        Ok(parsed
            .into_items()
            .into_iter()
            .map(|item| self.to_listing(item, market))
            .collect())
    }

    fn to_listing(&self, item: RemoteListing, requested: Option<Market>) -> Listing {
        let mut listing = Listing::new(item.symbol, item.name, self.category);
        listing.exchange = item.exchange;
        listing.fund_type = item.fund_type;
        listing.pinyin_initial = item.pinyin_initial;
        listing.pinyin_full = item.pinyin_full;

        match item.market.or(requested) {
            Some(market) => listing.with_market(market),
            None => listing,
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, market: Option<Market>) -> Result<Vec<Listing>, FetchError> {
        let body = self.get_body(market).await?;
        self.parse_body(&body, market)
    }
}
