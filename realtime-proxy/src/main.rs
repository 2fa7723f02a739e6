use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use realtime_proxy::cache::ResponseCache;
use realtime_proxy::config::RegionConfig;
use realtime_proxy::registry::ProviderRegistry;
use realtime_proxy::web::{AppState, create_router};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config_path = RegionConfig::resolve_config_path(&args);
    info!(path = %config_path.display(), "loading region config");
    let config = RegionConfig::from_file(&config_path).expect("Failed to load region config");

    // One cache for the whole region, shared by every provider
    let cache = Arc::new(ResponseCache::new(&config.cache));
    let registry = ProviderRegistry::from_configs(config.providers, cache)
        .expect("Failed to build provider registry");

    for provider in registry.iter() {
        info!(
            rt_system_id = %provider.id(),
            kind = provider.config().kind.name(),
            object_id_tag = provider.object_id_tag(),
            "provider loaded"
        );
    }

    let app = create_router(AppState::new(config.id.as_str(), Arc::new(registry)));

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .expect("Failed to bind");
    info!(region = %config.id, addr = %config.bind, "listening");
    axum::serve(listener, app).await.expect("Server error");
}
