//! Upstream source abstractions and adapters.
//!
//! This module contains:
//! - The `Fetcher` trait that every upstream source implements
//! - The HTTP JSON adapter used for configured upstream endpoints
//!
//! Vendor-specific scraping lives behind these endpoints; the registry and
//! aggregator only ever see `Fetcher`.

mod traits;

pub mod http;

pub use traits::Fetcher;
