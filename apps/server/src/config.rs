use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use findata_market_data::MarketDataSettings;

pub struct Config {
    pub listen_addr: SocketAddr,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    /// Cache store URL; the in-memory store is used when unset
    pub redis_url: Option<String>,
    /// Run every refresh job once right after start-up
    pub warm_on_start: bool,
    pub market_data: MarketDataSettings,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let listen_addr: SocketAddr = std::env::var("FD_LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8000".to_string())
            .parse()
            .context("Invalid FD_LISTEN_ADDR")?;
        let cors_allow = std::env::var("FD_CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let timeout_ms: u64 = std::env::var("FD_REQUEST_TIMEOUT_MS")
            .unwrap_or_else(|_| "30000".into())
            .parse()
            .unwrap_or(30000);
        let redis_url = std::env::var("FD_REDIS_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());
        let warm_on_start = std::env::var("FD_WARM_ON_START")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);
        let market_data = MarketDataSettings::from_env()?;

        Ok(Self {
            listen_addr,
            cors_allow,
            request_timeout: Duration::from_millis(timeout_ms),
            redis_url,
            warm_on_start,
            market_data,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            cors_allow: vec!["*".to_string()],
            request_timeout: Duration::from_secs(30),
            redis_url: None,
            warm_on_start: false,
            market_data: MarketDataSettings::default(),
        }
    }
}
