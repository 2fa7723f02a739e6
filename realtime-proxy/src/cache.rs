//! Caching layer for provider responses.
//!
//! Realtime feeds change every few seconds, but a busy stop is queried far
//! more often than that. Raw provider bodies are memoized for a short,
//! per-provider TTL.
//!
//! Keys are built from the provider's stable logical id plus the request
//! signature, never from a process-local handle, so that several provider
//! instances (or processes) serving the same logical provider converge on
//! the same entry. Two requests missing at the same time may both call the
//! provider; the last insert wins.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::Cache as MokaCache;
use tracing::trace;

use crate::domain::ProviderId;
use crate::provider::ProviderError;

/// Cache key: provider id and normalized request signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    provider: ProviderId,
    signature: String,
}

impl CacheKey {
    pub fn new(provider: ProviderId, signature: impl Into<String>) -> Self {
        Self {
            provider,
            signature: signature.into(),
        }
    }

    pub fn provider(&self) -> &ProviderId {
        &self.provider
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }
}

/// Cached raw response with its own lifetime.
#[derive(Debug, Clone)]
struct CacheEntry {
    body: Arc<str>,
    ttl: Duration,
}

/// Expires each entry after the TTL it was inserted with.
struct PerEntryTtl;

impl Expiry<CacheKey, CacheEntry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Configuration for the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of cached responses.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
        }
    }
}

/// Read-through cache of raw provider responses, shared by all providers.
pub struct ResponseCache {
    entries: MokaCache<CacheKey, CacheEntry>,
}

impl ResponseCache {
    /// Create a new cache with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        let entries = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(PerEntryTtl)
            .build();

        Self { entries }
    }

    /// Get a cached body if it has not expired.
    pub async fn get(&self, key: &CacheKey) -> Option<Arc<str>> {
        self.entries.get(key).await.map(|entry| entry.body)
    }

    /// Store a body for `ttl`.
    pub async fn insert(&self, key: CacheKey, body: Arc<str>, ttl: Duration) {
        self.entries.insert(key, CacheEntry { body, ttl }).await;
    }

    /// Return the cached body for `key`, or run `fetch` and cache its result.
    ///
    /// Failures are not cached.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: CacheKey,
        ttl: Duration,
        fetch: F,
    ) -> Result<Arc<str>, ProviderError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<str>, ProviderError>>,
    {
        if let Some(body) = self.get(&key).await {
            trace!(provider = %key.provider, signature = %key.signature, "cache hit");
            return Ok(body);
        }

        let body = fetch().await?;
        self.insert(key, body.clone(), ttl).await;
        Ok(body)
    }

    /// Invalidate all cached entries.
    pub fn invalidate_all(&self) {
        self.entries.invalidate_all();
    }
}
