//! Region configuration loaded from TOML.
//!
//! Config file is selected via:
//! 1. `--config <path>` command line argument
//! 2. `CONFIG_FILE` environment variable
//! 3. Default: `config/region.toml`
//!
//! ```toml
//! [region]
//! id = "fr-idf"
//!
//! [cache]
//! max_capacity = 10000
//!
//! [server]
//! bind = "127.0.0.1:8080"
//!
//! [[providers]]
//! id = "sytral"
//! kind = "sytral"
//! service_url = "http://sytralrt/departures"
//! object_id_tag = "source"
//! active_window = { start = "2016-04-01T00:00:00Z", end = "2016-05-01T00:00:00Z" }
//! ```
//!
//! Window bounds are quoted RFC 3339 strings.

use std::collections::{BTreeMap, HashSet};
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cache::CacheConfig;
use crate::domain::{ActiveWindow, TimeWindow};
use crate::provider::{BreakerConfig, ProviderConfig, ProviderKind, RateLimit, TimeoSettings};

const DEFAULT_CONFIG_PATH: &str = "config/region.toml";

/// Errors loading a region configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("duplicate provider id: {0}")]
    DuplicateProvider(String),

    #[error("provider {id}: active window end must be after its start")]
    InvalidWindow { id: String },

    #[error("provider {id}: circuit_breaker_max_fail must be at least 1")]
    InvalidFailMax { id: String },

    #[error("provider {id}: rate_limit_count and rate_limit_duration_secs must be at least 1")]
    InvalidRateLimit { id: String },

    #[error("provider {id}: unknown timezone {timezone}")]
    UnknownTimezone { id: String, timezone: String },

    #[error("provider {id}: timeo providers need a timezone")]
    MissingTimezone { id: String },

    #[error("invalid bind address {0}")]
    InvalidBind(String),
}

#[derive(Debug, Deserialize)]
struct TomlRegion {
    region: RegionSection,
    #[serde(default)]
    cache: CacheSection,
    #[serde(default)]
    server: ServerSection,
    #[serde(default)]
    providers: Vec<ProviderSection>,
}

#[derive(Debug, Deserialize)]
struct RegionSection {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CacheSection {
    #[serde(default = "default_max_capacity")]
    max_capacity: u64,
}

fn default_max_capacity() -> u64 {
    CacheConfig::default().max_capacity
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_capacity: default_max_capacity(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ServerSection {
    #[serde(default = "default_bind")]
    bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum KindName {
    SiriLite,
    Sytral,
    Timeo,
}

#[derive(Debug, Deserialize)]
struct ProviderSection {
    id: String,
    kind: KindName,
    service_url: String,
    #[serde(default)]
    object_id_tag: Option<String>,
    #[serde(default)]
    timeout_ms: Option<u64>,
    #[serde(default)]
    circuit_breaker_max_fail: Option<u32>,
    #[serde(default)]
    circuit_breaker_reset_timeout_secs: Option<u64>,
    #[serde(default)]
    cache_ttl_secs: Option<u64>,
    #[serde(default)]
    active_window: Option<TimeWindow>,
    #[serde(default)]
    rate_limit_count: Option<u32>,
    #[serde(default = "default_rate_limit_duration_secs")]
    rate_limit_duration_secs: u64,
    /// Timeo only.
    #[serde(default)]
    service_args: BTreeMap<String, String>,
    /// Timeo only.
    #[serde(default)]
    timezone: Option<String>,
    /// Timeo only.
    #[serde(default)]
    from_datetime_step_secs: Option<u64>,
    /// Timeo only.
    #[serde(default)]
    destination_id_tag: Option<String>,
}

fn default_rate_limit_duration_secs() -> u64 {
    1
}

impl ProviderSection {
    fn into_config(self) -> Result<ProviderConfig, ConfigError> {
        let kind = match self.kind {
            KindName::SiriLite => ProviderKind::SiriLite,
            KindName::Sytral => ProviderKind::Sytral,
            KindName::Timeo => {
                let name = self
                    .timezone
                    .as_deref()
                    .ok_or_else(|| ConfigError::MissingTimezone { id: self.id.clone() })?;
                let timezone = name.parse().map_err(|_| ConfigError::UnknownTimezone {
                    id: self.id.clone(),
                    timezone: name.to_string(),
                })?;
                let mut settings = TimeoSettings::new(timezone);
                settings.service_args = self.service_args;
                if let Some(step) = self.from_datetime_step_secs {
                    settings.from_datetime_step = Duration::from_secs(step);
                }
                settings.destination_id_tag = self.destination_id_tag;
                ProviderKind::Timeo(settings)
            }
        };

        let mut breaker = BreakerConfig::default();
        if let Some(fail_max) = self.circuit_breaker_max_fail {
            if fail_max == 0 {
                return Err(ConfigError::InvalidFailMax { id: self.id });
            }
            breaker.fail_max = fail_max;
        }
        if let Some(secs) = self.circuit_breaker_reset_timeout_secs {
            breaker.reset_timeout = Duration::from_secs(secs);
        }

        if self.active_window.is_some_and(|w| w.is_empty()) {
            return Err(ConfigError::InvalidWindow { id: self.id });
        }

        let rate_limit = match self.rate_limit_count {
            Some(count) => {
                let per = Duration::from_secs(self.rate_limit_duration_secs);
                match RateLimit::new(count, per) {
                    Some(limit) => Some(limit),
                    None => return Err(ConfigError::InvalidRateLimit { id: self.id }),
                }
            }
            None => None,
        };

        let mut config = ProviderConfig::new(self.id, kind, self.service_url)
            .with_breaker(breaker)
            .with_active_window(ActiveWindow::from(self.active_window));
        if let Some(tag) = self.object_id_tag {
            config = config.with_object_id_tag(tag);
        }
        if let Some(ms) = self.timeout_ms {
            config = config.with_timeout(Duration::from_millis(ms));
        }
        if let Some(secs) = self.cache_ttl_secs {
            config = config.with_cache_ttl(Duration::from_secs(secs));
        }
        if let Some(limit) = rate_limit {
            config = config.with_rate_limit(limit);
        }
        Ok(config)
    }
}

/// Validated configuration of one region.
#[derive(Debug, Clone)]
pub struct RegionConfig {
    pub id: String,
    pub cache: CacheConfig,
    pub bind: SocketAddr,
    /// Providers in declaration order, which is also ownership priority.
    pub providers: Vec<ProviderConfig>,
}

impl RegionConfig {
    /// Determine config file path from args or environment.
    pub fn resolve_config_path(args: &[String]) -> PathBuf {
        for (i, arg) in args.iter().enumerate() {
            if arg == "--config" {
                if let Some(path) = args.get(i + 1) {
                    return PathBuf::from(path);
                }
            }
            if let Some(path) = arg.strip_prefix("--config=") {
                return PathBuf::from(path);
            }
        }

        if let Ok(path) = env::var("CONFIG_FILE") {
            return PathBuf::from(path);
        }

        PathBuf::from(DEFAULT_CONFIG_PATH)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: TomlRegion = toml::from_str(content)?;

        let bind = raw
            .server
            .bind
            .parse()
            .map_err(|_| ConfigError::InvalidBind(raw.server.bind.clone()))?;

        let mut seen = HashSet::new();
        let mut providers = Vec::with_capacity(raw.providers.len());
        for section in raw.providers {
            if !seen.insert(section.id.clone()) {
                return Err(ConfigError::DuplicateProvider(section.id));
            }
            providers.push(section.into_config()?);
        }

        Ok(Self {
            id: raw.region.id,
            cache: CacheConfig {
                max_capacity: raw.cache.max_capacity,
            },
            bind,
            providers,
        })
    }
}
