use serde::{Deserialize, Serialize};

use super::category::{AssetCategory, Exchange, Market};

/// One tradable item in a category list (a stock, an ETF, a fund).
///
/// Optional fields serialize as `null`; the cache layer strips them before
/// storing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    /// Exchange or fund code, e.g. "600519", "00700", "AAPL"
    pub symbol: String,

    /// Display name
    pub name: String,

    pub category: AssetCategory,

    pub market: Option<Market>,

    pub exchange: Option<Exchange>,

    /// Fund classification reported by the source (funds only)
    pub fund_type: Option<String>,

    pub pinyin_initial: Option<String>,

    pub pinyin_full: Option<String>,
}

impl Listing {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>, category: AssetCategory) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            category,
            market: None,
            exchange: None,
            fund_type: None,
            pinyin_initial: None,
            pinyin_full: None,
        }
    }

    /// Set the market, inferring the exchange for mainland listings.
    pub fn with_market(mut self, market: Market) -> Self {
        if market == Market::CN && self.exchange.is_none() {
            self.exchange = Exchange::for_cn_symbol(&self.symbol);
        }
        self.market = Some(market);
        self
    }

    pub fn with_fund_type(mut self, fund_type: impl Into<String>) -> Self {
        self.fund_type = Some(fund_type.into());
        self
    }
}
