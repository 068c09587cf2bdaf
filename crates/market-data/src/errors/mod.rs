//! Error types for the market data crate.
//!
//! This module provides:
//! - [`FetchError`]: What a single fetcher reports when it cannot produce data
//! - [`CacheError`]: Cache store failures, never fatal to a request
//! - [`SchedulerError`]: Refresh orchestrator lifecycle and configuration errors
//! - [`MarketDataError`]: The main error enum for all market data operations

use thiserror::Error;

/// Failure reported by a single fetcher.
///
/// The aggregator folds both variants into its fallback loop. The split only
/// decides how loudly the failure is logged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The upstream source is down, throttling us, or returned an error status.
    /// Expected in normal operation; the next provider is tried.
    #[error("{detail}")]
    Unavailable {
        /// Human readable reason reported by the source
        detail: String,
    },

    /// The fetcher failed in a way it did not anticipate (bad payload, bug).
    /// Still falls through to the next provider, but is logged as an error.
    #[error("{message}")]
    Unexpected {
        /// Description of the failure
        message: String,
    },
}

impl FetchError {
    pub fn unavailable(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self::Unavailable {
            detail: if detail.is_empty() {
                "provider unavailable".to_string()
            } else {
                detail
            },
        }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Errors raised by a cache store.
///
/// The cache-aside adapter swallows all of these; they only surface from
/// direct store use (e.g. connecting at start-up).
#[derive(Error, Debug)]
pub enum CacheError {
    /// Could not reach the backing store.
    #[error("Cache connection error: {0}")]
    Connection(String),

    /// Value could not be encoded or decoded as JSON.
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store rejected the command.
    #[error("Cache backend error: {0}")]
    Backend(String),
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_refusal() || err.is_timeout() {
            Self::Connection(err.to_string())
        } else {
            Self::Backend(err.to_string())
        }
    }
}

/// Errors from the scheduled refresh orchestrator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// Jobs can only be installed on a running scheduler.
    #[error("Scheduler not started")]
    NotRunning,

    /// `Stopped` is terminal; a stopped scheduler cannot be restarted.
    #[error("Scheduler already stopped")]
    AlreadyStopped,

    #[error("Invalid cron expression '{expr}': {reason}")]
    InvalidCron { expr: String, reason: String },

    #[error("Unknown job: {0}")]
    UnknownJob(String),
}

/// Errors that can occur during market data operations.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// Every provider registered for the category failed.
    ///
    /// Carries one `"{provider}: {reason}"` entry per attempted provider, in
    /// priority order. Empty when no provider is registered.
    #[error("{}", selection_message(.errors))]
    ProviderSelection {
        /// Per-provider failure reasons in the order they were tried
        errors: Vec<String>,
    },

    /// A single fetch failed outside of provider selection.
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("Invalid asset category: {0}")]
    InvalidCategory(String),

    #[error("Invalid market: {0}")]
    InvalidMarket(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl MarketDataError {
    /// The per-provider failure reasons when provider selection failed.
    pub fn provider_errors(&self) -> Option<&[String]> {
        match self {
            Self::ProviderSelection { errors } => Some(errors),
            _ => None,
        }
    }
}

fn selection_message(errors: &[String]) -> String {
    if errors.is_empty() {
        "no provider available".to_string()
    } else {
        errors.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_error_display_joins_reasons() {
        let error = MarketDataError::ProviderSelection {
            errors: vec![
                "em: connection reset".to_string(),
                "sina: HTTP error: 502".to_string(),
            ],
        };
        assert_eq!(
            error.to_string(),
            "em: connection reset; sina: HTTP error: 502"
        );
        assert_eq!(error.provider_errors().map(|e| e.len()), Some(2));
    }

    #[test]
    fn test_selection_error_without_providers() {
        let error = MarketDataError::ProviderSelection { errors: vec![] };
        assert_eq!(error.to_string(), "no provider available");
    }

    #[test]
    fn test_unavailable_defaults_detail() {
        let error = FetchError::unavailable("");
        assert_eq!(error.to_string(), "provider unavailable");
        assert!(error.is_unavailable());

        let error = FetchError::unexpected("missing field `symbol`");
        assert!(!error.is_unavailable());
        assert_eq!(error.to_string(), "missing field `symbol`");
    }

    #[test]
    fn test_error_display() {
        let error = SchedulerError::InvalidCron {
            expr: "0 2 * *".to_string(),
            reason: "expected 5 fields, found 4".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid cron expression '0 2 * *': expected 5 fields, found 4"
        );

        let error = MarketDataError::InvalidCategory("bond".to_string());
        assert_eq!(error.to_string(), "Invalid asset category: bond");

        let error = MarketDataError::Fetch(FetchError::unavailable("timeout"));
        assert_eq!(error.to_string(), "Fetch failed: timeout");
    }
}
