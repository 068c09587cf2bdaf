use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::MarketDataError;

/// Asset category served by the market data layer.
///
/// Each category has its own provider set, cache TTL and refresh schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetCategory {
    Stock,
    Etf,
    Fund,
}

impl AssetCategory {
    pub const ALL: [AssetCategory; 3] = [Self::Stock, Self::Etf, Self::Fund];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stock => "stock",
            Self::Etf => "etf",
            Self::Fund => "fund",
        }
    }

    /// Markets this category is split into for fetching, caching and refresh.
    ///
    /// Empty for categories that are fetched as a single list.
    pub fn partitions(&self) -> &'static [Market] {
        match self {
            Self::Stock => &Market::ALL,
            Self::Etf | Self::Fund => &[],
        }
    }

    pub fn is_partitioned(&self) -> bool {
        !self.partitions().is_empty()
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetCategory {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stock" | "stocks" => Ok(Self::Stock),
            "etf" | "etfs" => Ok(Self::Etf),
            "fund" | "funds" => Ok(Self::Fund),
            _ => Err(MarketDataError::InvalidCategory(s.to_string())),
        }
    }
}

/// Market a listing trades in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Market {
    CN,
    HK,
    US,
}

impl Market {
    pub const ALL: [Market; 3] = [Self::CN, Self::HK, Self::US];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CN => "CN",
            Self::HK => "HK",
            Self::US => "US",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Market {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CN" => Ok(Self::CN),
            "HK" => Ok(Self::HK),
            "US" => Ok(Self::US),
            _ => Err(MarketDataError::InvalidMarket(s.to_string())),
        }
    }
}

/// Mainland China exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exchange {
    /// Shanghai Stock Exchange
    SSE,
    /// Shenzhen Stock Exchange
    SZSE,
    /// Beijing Stock Exchange
    BJSE,
}

impl Exchange {
    /// Infer the exchange of an A-share from its six-digit code prefix.
    pub fn for_cn_symbol(symbol: &str) -> Option<Self> {
        match symbol.as_bytes().first()? {
            b'6' => Some(Self::SSE),
            b'0' | b'3' => Some(Self::SZSE),
            b'4' | b'8' => Some(Self::BJSE),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse() {
        assert_eq!("stock".parse::<AssetCategory>().unwrap(), AssetCategory::Stock);
        assert_eq!("ETF".parse::<AssetCategory>().unwrap(), AssetCategory::Etf);
        assert_eq!("funds".parse::<AssetCategory>().unwrap(), AssetCategory::Fund);
        assert!(matches!(
            "bond".parse::<AssetCategory>(),
            Err(MarketDataError::InvalidCategory(_))
        ));
    }

    #[test]
    fn test_only_stocks_are_partitioned() {
        assert_eq!(AssetCategory::Stock.partitions(), &Market::ALL);
        assert!(!AssetCategory::Etf.is_partitioned());
        assert!(!AssetCategory::Fund.is_partitioned());
    }

    #[test]
    fn test_market_parse() {
        assert_eq!("hk".parse::<Market>().unwrap(), Market::HK);
        assert!(matches!(
            "JP".parse::<Market>(),
            Err(MarketDataError::InvalidMarket(_))
        ));
    }

    #[test]
    fn test_exchange_from_cn_symbol() {
        assert_eq!(Exchange::for_cn_symbol("600519"), Some(Exchange::SSE));
        assert_eq!(Exchange::for_cn_symbol("000001"), Some(Exchange::SZSE));
        assert_eq!(Exchange::for_cn_symbol("300750"), Some(Exchange::SZSE));
        assert_eq!(Exchange::for_cn_symbol("830799"), Some(Exchange::BJSE));
        assert_eq!(Exchange::for_cn_symbol("AAPL"), None);
        assert_eq!(Exchange::for_cn_symbol(""), None);
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&AssetCategory::Etf).unwrap(),
            "\"etf\""
        );
        assert_eq!(serde_json::to_string(&Market::US).unwrap(), "\"US\"");
    }
}
