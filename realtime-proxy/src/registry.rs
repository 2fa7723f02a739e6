//! The providers configured for a region, and which one owns a route point.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::cache::ResponseCache;
use crate::domain::{ProviderId, RoutePoint};
use crate::provider::{BuildError, ProviderConfig, ProviderStatus, RealtimeProvider};

/// Errors building a registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate provider id: {0}")]
    DuplicateProvider(ProviderId),

    #[error("cannot build provider {id}: {source}")]
    Provider {
        id: ProviderId,
        #[source]
        source: BuildError,
    },
}

/// Read-only set of providers, in configuration order.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: Vec<RealtimeProvider>,
    by_id: HashMap<ProviderId, usize>,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<RealtimeProvider>) -> Result<Self, RegistryError> {
        let mut by_id = HashMap::with_capacity(providers.len());
        for (idx, provider) in providers.iter().enumerate() {
            if by_id.insert(provider.id().clone(), idx).is_some() {
                return Err(RegistryError::DuplicateProvider(provider.id().clone()));
            }
        }
        Ok(Self { providers, by_id })
    }

    /// Build every provider, all sharing `cache`.
    pub fn from_configs(
        configs: Vec<ProviderConfig>,
        cache: Arc<ResponseCache>,
    ) -> Result<Self, RegistryError> {
        let providers = configs
            .into_iter()
            .map(|config| {
                let id = config.id.clone();
                RealtimeProvider::new(config, cache.clone())
                    .map_err(|source| RegistryError::Provider { id, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(providers)
    }

    pub fn get(&self, id: &ProviderId) -> Option<&RealtimeProvider> {
        self.by_id.get(id).map(|&idx| &self.providers[idx])
    }

    /// The provider owning `route_point`, if any.
    ///
    /// A provider designated on the line wins. Otherwise the first provider,
    /// in configuration order, for which the route point carries codes.
    pub fn resolve(&self, route_point: &RoutePoint) -> Option<&RealtimeProvider> {
        if let Some(designated) = &route_point.realtime_system {
            let provider = self.get(designated);
            if provider.is_none() {
                info!(
                    rt_system_id = %designated,
                    route_point = ?route_point.key(),
                    "no handler for realtime system"
                );
            }
            return provider;
        }

        self.providers
            .iter()
            .find(|p| route_point.has_codes_for(p.object_id_tag()))
    }

    pub fn statuses(&self) -> Vec<ProviderStatus> {
        self.providers.iter().map(RealtimeProvider::status).collect()
    }

    pub fn status(&self, id: &ProviderId) -> Option<ProviderStatus> {
        self.get(id).map(RealtimeProvider::status)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RealtimeProvider> {
        self.providers.iter()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
