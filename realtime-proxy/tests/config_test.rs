//! Integration tests for region configuration loading

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use realtime_proxy::cache::ResponseCache;
use realtime_proxy::config::{ConfigError, RegionConfig};
use realtime_proxy::domain::{ActiveWindow, LineId, ProviderId, RouteId, RoutePoint, StopPointId};
use realtime_proxy::provider::ProviderKind;
use realtime_proxy::registry::ProviderRegistry;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

#[test]
fn test_load_config_from_file() {
    let temp_file = write_config(
        r#"
[region]
id = "test-region"

[cache]
max_capacity = 500

[server]
bind = "0.0.0.0:9090"

[[providers]]
id = "siri"
kind = "siri_lite"
service_url = "http://siri/"
object_id_tag = "STIF"
timeout_ms = 1500
circuit_breaker_max_fail = 2
circuit_breaker_reset_timeout_secs = 10
cache_ttl_secs = 5
active_window = { start = "2024-03-01T04:00:00Z", end = "2024-03-02T04:00:00Z" }
"#,
    );

    let config = RegionConfig::from_file(temp_file.path()).unwrap();

    assert_eq!(config.id, "test-region");
    assert_eq!(config.cache.max_capacity, 500);
    assert_eq!(config.bind.port(), 9090);

    let provider = &config.providers[0];
    assert_eq!(provider.id, ProviderId::from("siri"));
    assert_eq!(provider.kind, ProviderKind::SiriLite);
    assert_eq!(provider.object_id_tag, "STIF");
    assert_eq!(provider.timeout, Duration::from_millis(1500));
    assert_eq!(provider.breaker.fail_max, 2);
    assert_eq!(provider.breaker.reset_timeout, Duration::from_secs(10));
    assert_eq!(provider.cache_ttl, Duration::from_secs(5));
    assert!(matches!(provider.active_window, ActiveWindow::Bounded(_)));
}

#[test]
fn test_missing_file_is_io_error() {
    let err = RegionConfig::from_file("/nonexistent/region.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(err.to_string().contains("/nonexistent/region.toml"));
}

#[test]
fn test_duplicate_provider_ids() {
    let temp_file = write_config(
        r#"
[region]
id = "r"

[[providers]]
id = "a"
kind = "sytral"
service_url = "http://a/"

[[providers]]
id = "a"
kind = "siri_lite"
service_url = "http://b/"
"#,
    );

    let err = RegionConfig::from_file(temp_file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateProvider(id) if id == "a"));
}

#[tokio::test]
async fn test_shipped_config_builds_a_registry() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/region.toml");
    let config = RegionConfig::from_file(path).unwrap();
    assert_eq!(config.providers.len(), 3);

    let ProviderKind::Timeo(settings) = &config.providers[2].kind else {
        panic!("expected the third provider to be timeo");
    };
    assert_eq!(settings.service_args.get("serviceID").map(String::as_str), Some("9"));
    assert_eq!(config.providers[2].rate_limit.map(|l| l.count.get()), Some(10));

    let cache = Arc::new(ResponseCache::new(&config.cache));
    let registry = ProviderRegistry::from_configs(config.providers, cache).unwrap();
    assert_eq!(registry.len(), 3);

    let rp = RoutePoint::new(
        StopPointId::from("stop_point:1"),
        RouteId::from("route:1"),
        LineId::from("line:1"),
    )
    .with_stop_code("Timeo", "1337")
    .with_line_code("Timeo", "42")
    .with_route_code("Timeo", "A");
    assert_eq!(
        registry.resolve(&rp).map(|p| p.id().as_str()),
        Some("timeo_tisseo")
    );
}
