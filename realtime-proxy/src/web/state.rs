//! Application state for the web layer.

use std::sync::Arc;

use crate::registry::ProviderRegistry;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Region these providers serve.
    pub region: Arc<str>,

    /// Providers configured for the region
    pub registry: Arc<ProviderRegistry>,
}

impl AppState {
    pub fn new(region: impl Into<Arc<str>>, registry: Arc<ProviderRegistry>) -> Self {
        Self {
            region: region.into(),
            registry,
        }
    }
}
