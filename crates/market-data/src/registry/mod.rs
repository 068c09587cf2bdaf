//! Provider registry module.
//!
//! This module provides provider selection for every asset category:
//! - Provider registration and priority ordering
//! - Sequential fallback across providers
//! - Diagnostic tracking for debugging provider selection

mod aggregator;
mod diagnostics;
mod provider_registry;

pub use aggregator::Aggregator;
pub use diagnostics::{FetchDiagnostics, ProviderAttempt};
pub use provider_registry::ProviderRegistry;
