//! Provider configuration.

use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::time::Duration;

use chrono_tz::Tz;

use crate::domain::{ActiveWindow, ProviderId};

use super::breaker::BreakerConfig;

/// Wire protocol spoken by a provider, with protocol-specific settings.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderKind {
    /// SIRI-lite style stop monitoring (JSON).
    SiriLite,
    /// Sytral-style departures API.
    Sytral,
    /// Timeo next-stop-times API.
    Timeo(TimeoSettings),
}

/// Settings specific to Timeo providers.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeoSettings {
    /// Extra query parameters sent on every call (credentials, etc.).
    pub service_args: BTreeMap<String, String>,
    /// Timezone of the local times returned by the provider.
    pub timezone: Tz,
    /// Reference times sent to the provider are floored to this step, so
    /// that close requests share a cache entry.
    pub from_datetime_step: Duration,
    /// Tag of the stop codes the provider uses for terminuses. When set,
    /// directions are labelled with the terminus stop area.
    pub destination_id_tag: Option<String>,
}

impl TimeoSettings {
    pub fn new(timezone: Tz) -> Self {
        Self {
            service_args: BTreeMap::new(),
            timezone,
            from_datetime_step: Duration::from_secs(60),
            destination_id_tag: None,
        }
    }

    pub fn with_service_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.service_args.insert(key.into(), value.into());
        self
    }

    pub fn with_from_datetime_step(mut self, step: Duration) -> Self {
        self.from_datetime_step = step;
        self
    }

    pub fn with_destination_id_tag(mut self, tag: impl Into<String>) -> Self {
        self.destination_id_tag = Some(tag.into());
        self
    }
}

/// At most `count` provider calls per `per`.
///
/// Cache hits do not count. A call over the limit is not made and the route
/// point keeps its base schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub count: NonZeroU32,
    pub per: Duration,
}

impl RateLimit {
    /// `None` when `count` or `per` is zero.
    pub fn new(count: u32, per: Duration) -> Option<Self> {
        let count = NonZeroU32::new(count)?;
        (!per.is_zero()).then_some(Self { count, per })
    }
}

impl ProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::SiriLite => "siri_lite",
            ProviderKind::Sytral => "sytral",
            ProviderKind::Timeo(_) => "timeo",
        }
    }

    pub fn default_timeout(&self) -> Duration {
        match self {
            ProviderKind::Sytral => Duration::from_secs(2),
            ProviderKind::SiriLite | ProviderKind::Timeo(_) => Duration::from_secs(10),
        }
    }

    pub fn default_cache_ttl(&self) -> Duration {
        match self {
            ProviderKind::Timeo(_) => Duration::from_secs(60),
            ProviderKind::SiriLite | ProviderKind::Sytral => Duration::from_secs(30),
        }
    }
}

/// Configuration of one realtime provider in a region.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    /// Stable logical id, also used as the cache-sharing key.
    pub id: ProviderId,
    pub kind: ProviderKind,
    /// Base URL of the provider endpoint.
    pub service_url: String,
    /// Tag under which route points carry this provider's codes.
    pub object_id_tag: String,
    pub timeout: Duration,
    pub breaker: BreakerConfig,
    pub cache_ttl: Duration,
    pub active_window: ActiveWindow,
    pub rate_limit: Option<RateLimit>,
}

impl ProviderConfig {
    /// Create a config with the kind's defaults. The tag defaults to the id.
    pub fn new(id: impl Into<String>, kind: ProviderKind, service_url: impl Into<String>) -> Self {
        let id = ProviderId::new(id);
        Self {
            object_id_tag: id.as_str().to_string(),
            id,
            timeout: kind.default_timeout(),
            cache_ttl: kind.default_cache_ttl(),
            kind,
            service_url: service_url.into(),
            breaker: BreakerConfig::default(),
            active_window: ActiveWindow::Unbounded,
            rate_limit: None,
        }
    }

    pub fn with_object_id_tag(mut self, tag: impl Into<String>) -> Self {
        self.object_id_tag = tag.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_breaker(mut self, breaker: BreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_active_window(mut self, window: ActiveWindow) -> Self {
        self.active_window = window;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }
}
