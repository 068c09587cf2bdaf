//! Market data models
//!
//! - `types` - Type aliases for common identifiers (ProviderId)
//! - `category` - Asset categories, markets and exchanges
//! - `listing` - The item returned by every fetcher (Listing)

mod category;
mod listing;
mod types;

pub use category::{AssetCategory, Exchange, Market};
pub use listing::Listing;
pub use types::ProviderId;
