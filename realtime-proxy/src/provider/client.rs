//! The generic realtime provider: one configured endpoint, its breaker and
//! its view of the shared response cache.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use parking_lot::Mutex;
use reqwest::Url;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::cache::{CacheKey, ResponseCache};
use crate::domain::{ActiveWindow, ProviderId, RoutePassage, RoutePoint};
use crate::engine::RouteMatcher;

use super::breaker::{BreakerStatus, CircuitBreaker};
use super::config::{ProviderConfig, ProviderKind, RateLimit};
use super::error::{BuildError, ErrorKind, ProviderError};
use super::protocol::{PassageQuery, ProviderRequest, WireProtocol};
use super::siri_lite::SiriLite;
use super::sytral::Sytral;
use super::timeo::Timeo;

/// Last external failure seen by a provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureRecord {
    pub kind: ErrorKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Health snapshot of one provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderStatus {
    pub id: ProviderId,
    pub kind: &'static str,
    /// Call timeout in seconds.
    pub timeout: f64,
    pub circuit_breaker: BreakerStatus,
    pub cache_ttl_secs: u64,
    pub last_failure: Option<FailureRecord>,
}

/// A realtime provider adapter.
///
/// Every call goes cache first, then through the rate limiter and the
/// circuit breaker, then over HTTP. Parsing happens on the raw body
/// afterwards, so a cached body is parsed again for each route point that
/// shares the request.
pub struct RealtimeProvider {
    config: ProviderConfig,
    protocol: Box<dyn WireProtocol>,
    http: reqwest::Client,
    rate_limiter: Option<DefaultDirectRateLimiter>,
    breaker: CircuitBreaker,
    cache: Arc<ResponseCache>,
    last_failure: Mutex<Option<FailureRecord>>,
}

impl std::fmt::Debug for RealtimeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeProvider")
            .field("id", &self.config.id)
            .field("kind", &self.config.kind.name())
            .field("service_url", &self.config.service_url)
            .finish()
    }
}

fn protocol_for(config: &ProviderConfig, service_url: Url) -> Box<dyn WireProtocol> {
    let url = &config.service_url;
    let tag = &config.object_id_tag;
    match &config.kind {
        ProviderKind::SiriLite => Box::new(SiriLite::new(url, tag)),
        ProviderKind::Sytral => Box::new(Sytral::new(service_url, tag)),
        ProviderKind::Timeo(settings) => Box::new(Timeo::new(url, tag, settings.clone())),
    }
}

fn rate_limiter(limit: &RateLimit) -> Result<DefaultDirectRateLimiter, BuildError> {
    let count = limit.count;
    let quota = Quota::with_period(limit.per / count.get())
        .ok_or(BuildError::InvalidRateLimit { count: count.get() })?
        .allow_burst(count);
    Ok(RateLimiter::direct(quota))
}

impl RealtimeProvider {
    /// Create a provider from its configuration, sharing `cache`.
    pub fn new(config: ProviderConfig, cache: Arc<ResponseCache>) -> Result<Self, BuildError> {
        let service_url = Url::parse(&config.service_url).map_err(|e| BuildError::InvalidUrl {
            url: config.service_url.clone(),
            message: e.to_string(),
        })?;
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        let rate_limiter = config.rate_limit.as_ref().map(rate_limiter).transpose()?;
        let breaker = CircuitBreaker::new(config.id.as_str(), config.breaker);

        Ok(Self {
            protocol: protocol_for(&config, service_url),
            config,
            http,
            rate_limiter,
            breaker,
            cache,
            last_failure: Mutex::new(None),
        })
    }

    pub fn id(&self) -> &ProviderId {
        &self.config.id
    }

    pub fn object_id_tag(&self) -> &str {
        &self.config.object_id_tag
    }

    pub fn active_window(&self) -> &ActiveWindow {
        &self.config.active_window
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Next passages at `route_point`.
    ///
    /// Every failure is returned to the caller, who falls back to the base
    /// schedule. Non-routine ones are also remembered for [`Self::status`].
    pub async fn fetch(
        &self,
        route_point: &RoutePoint,
        query: &PassageQuery,
        matcher: &dyn RouteMatcher,
    ) -> Result<Vec<RoutePassage>, ProviderError> {
        let request = self
            .protocol
            .build_request(route_point, query)
            .map_err(|e| self.observe(e))?;

        debug!(rt_system_id = %self.config.id, url = %request.url(), "realtime provider call");

        let key = CacheKey::new(self.config.id.clone(), request.signature());
        let body = self
            .cache
            .get_or_fetch(key, self.config.cache_ttl, || self.call(&request))
            .await
            .map_err(|e| self.observe(e))?;

        self.protocol
            .parse_passages(route_point, query, &body, matcher)
            .map_err(|e| self.observe(e))
    }

    /// Cache miss: spend a rate-limit token, then go through the breaker.
    async fn call(&self, request: &ProviderRequest) -> Result<Arc<str>, ProviderError> {
        if let Some(limiter) = &self.rate_limiter {
            if limiter.check().is_err() {
                return Err(ProviderError::RateLimited);
            }
        }
        self.breaker.call(|| self.send(request)).await
    }

    async fn send(&self, request: &ProviderRequest) -> Result<Arc<str>, ProviderError> {
        let response = self.http.get(request.url()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        Ok(Arc::from(body))
    }

    /// Log `err` and, unless routine, record it as the last failure.
    fn observe(&self, err: ProviderError) -> ProviderError {
        let id = &self.config.id;
        if err.is_routine() {
            debug!(rt_system_id = %id, reason = %err, "realtime not applicable");
            return err;
        }
        if matches!(err, ProviderError::MalformedResponse(_)) {
            warn!(rt_system_id = %id, error = %err, "invalid realtime response, using base schedule");
        } else {
            error!(rt_system_id = %id, error = %err, "realtime service unavailable, using base schedule");
        }

        *self.last_failure.lock() = Some(FailureRecord {
            kind: err.kind(),
            message: err.to_string(),
            at: Utc::now(),
        });
        err
    }

    pub fn status(&self) -> ProviderStatus {
        ProviderStatus {
            id: self.config.id.clone(),
            kind: self.config.kind.name(),
            timeout: self.config.timeout.as_secs_f64(),
            circuit_breaker: self.breaker.status(),
            cache_ttl_secs: self.config.cache_ttl.as_secs(),
            last_failure: self.last_failure.lock().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::http::StatusCode;
    use chrono::TimeZone;

    use crate::cache::CacheConfig;
    use crate::domain::{LineId, RouteId, StopPointId};
    use crate::provider::{BreakerConfig, BreakerState, RateLimit};
    use crate::testing::{StaticMatcher, serve, serve_with_delay};

    const DEPARTURES: &str = r#"{"departures": [
        {"line": "05", "datetime": "2016-04-11T14:37:15+02:00", "direction_name": "Piscine", "type": "E"}
    ]}"#;

    fn sytral(url: &str) -> ProviderConfig {
        ProviderConfig::new("sytral", ProviderKind::Sytral, url)
            .with_object_id_tag("source")
            .with_breaker(BreakerConfig::new(2, Duration::from_secs(600)))
    }

    fn provider(config: ProviderConfig) -> RealtimeProvider {
        RealtimeProvider::new(config, Arc::new(ResponseCache::new(&CacheConfig::default()))).unwrap()
    }

    fn route_point() -> RoutePoint {
        RoutePoint::new(
            StopPointId::from("stop_point:42"),
            RouteId::from("route:05"),
            LineId::from("line:05"),
        )
        .with_stop_code("source", "42")
        .with_line_code("source", "05")
    }

    fn query() -> PassageQuery {
        PassageQuery::new(Utc.with_ymd_and_hms(2016, 4, 11, 12, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn fetch_parses_provider_passages() {
        let server = serve(StatusCode::OK, DEPARTURES).await;
        let provider = provider(sytral(&server.url));

        let passages = provider
            .fetch(&route_point(), &query(), &StaticMatcher::default())
            .await
            .unwrap();

        assert_eq!(passages.len(), 1);
        assert_eq!(
            passages[0].passage.time,
            Utc.with_ymd_and_hms(2016, 4, 11, 12, 37, 15).unwrap()
        );
        assert!(provider.status().last_failure.is_none());
    }

    #[tokio::test]
    async fn identical_requests_hit_the_provider_once() {
        let server = serve(StatusCode::OK, DEPARTURES).await;
        let provider = provider(sytral(&server.url));

        for _ in 0..2 {
            provider
                .fetch(&route_point(), &query(), &StaticMatcher::default())
                .await
                .unwrap();
        }
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn instances_with_same_id_share_cached_responses() {
        let server = serve(StatusCode::OK, DEPARTURES).await;
        let cache = Arc::new(ResponseCache::new(&CacheConfig::default()));
        let first = RealtimeProvider::new(sytral(&server.url), cache.clone()).unwrap();
        let second = RealtimeProvider::new(sytral(&server.url), cache).unwrap();

        first.fetch(&route_point(), &query(), &StaticMatcher::default()).await.unwrap();
        second.fetch(&route_point(), &query(), &StaticMatcher::default()).await.unwrap();
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn breaker_stops_calling_a_failing_provider() {
        let server = serve(StatusCode::INTERNAL_SERVER_ERROR, "boom").await;
        let provider = provider(sytral(&server.url));
        let matcher = StaticMatcher::default();

        for _ in 0..2 {
            let err = provider.fetch(&route_point(), &query(), &matcher).await.unwrap_err();
            assert_eq!(err, ProviderError::Status(500));
        }
        let err = provider.fetch(&route_point(), &query(), &matcher).await.unwrap_err();
        assert_eq!(err, ProviderError::BreakerOpen);
        assert_eq!(server.hits(), 2);

        let status = provider.status();
        assert_eq!(status.circuit_breaker.current_state, BreakerState::Open);
        assert_eq!(status.circuit_breaker.fail_counter, 2);
        assert_eq!(
            status.last_failure.map(|f| f.kind),
            Some(ErrorKind::BreakerOpen)
        );
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let server =
            serve_with_delay(StatusCode::OK, DEPARTURES, Some(Duration::from_millis(500))).await;
        let provider = provider(sytral(&server.url).with_timeout(Duration::from_millis(50)));

        let err = provider
            .fetch(&route_point(), &query(), &StaticMatcher::default())
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::Timeout);
        assert_eq!(provider.status().circuit_breaker.fail_counter, 1);
    }

    #[tokio::test]
    async fn malformed_body_is_not_a_breaker_failure() {
        let server = serve(StatusCode::OK, "<html>").await;
        let provider = provider(sytral(&server.url));

        let err = provider
            .fetch(&route_point(), &query(), &StaticMatcher::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));

        let status = provider.status();
        assert_eq!(status.circuit_breaker.fail_counter, 0);
        assert_eq!(
            status.last_failure.map(|f| f.kind),
            Some(ErrorKind::MalformedResponse)
        );
    }

    #[tokio::test]
    async fn missing_codes_make_no_call() {
        let server = serve(StatusCode::OK, DEPARTURES).await;
        let provider = provider(sytral(&server.url));
        let bare = RoutePoint::new(
            StopPointId::from("stop_point:42"),
            RouteId::from("route:05"),
            LineId::from("line:05"),
        );

        let err = provider
            .fetch(&bare, &query(), &StaticMatcher::default())
            .await
            .unwrap_err();
        assert!(err.is_routine());
        assert_eq!(server.hits(), 0);
        assert!(provider.status().last_failure.is_none());
    }

    #[tokio::test]
    async fn rate_limited_calls_fall_back_without_tripping() {
        let server = serve(StatusCode::OK, DEPARTURES).await;
        let limit = RateLimit::new(2, Duration::from_secs(60)).unwrap();
        let provider = provider(sytral(&server.url).with_rate_limit(limit));
        let matcher = StaticMatcher::default();

        for stop in ["1", "2"] {
            let rp = route_point().with_stop_code("source", stop);
            provider.fetch(&rp, &query(), &matcher).await.unwrap();
        }
        let rp = route_point().with_stop_code("source", "3");
        let err = provider.fetch(&rp, &query(), &matcher).await.unwrap_err();

        assert_eq!(err, ProviderError::RateLimited);
        assert_eq!(server.hits(), 2);
        let status = provider.status();
        assert_eq!(status.circuit_breaker.fail_counter, 0);
        assert!(status.last_failure.is_none());
    }

    #[tokio::test]
    async fn cached_responses_do_not_spend_the_rate_limit() {
        let server = serve(StatusCode::OK, DEPARTURES).await;
        let limit = RateLimit::new(1, Duration::from_secs(60)).unwrap();
        let provider = provider(sytral(&server.url).with_rate_limit(limit));

        for _ in 0..3 {
            provider
                .fetch(&route_point(), &query(), &StaticMatcher::default())
                .await
                .unwrap();
        }
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn invalid_service_url_is_rejected_at_build() {
        let cache = Arc::new(ResponseCache::new(&CacheConfig::default()));
        let err = RealtimeProvider::new(sytral("not a url"), cache).unwrap_err();
        assert!(matches!(err, BuildError::InvalidUrl { url, .. } if url == "not a url"));
    }

    #[tokio::test]
    async fn status_serializes_for_operators() {
        let provider = provider(sytral("http://sytralrt/"));
        let json = serde_json::to_value(provider.status()).unwrap();

        assert_eq!(json["id"], "sytral");
        assert_eq!(json["kind"], "sytral");
        assert_eq!(json["timeout"], 2.0);
        assert_eq!(json["circuit_breaker"]["current_state"], "closed");
        assert_eq!(json["circuit_breaker"]["reset_timeout"], 600);
        assert_eq!(json["cache_ttl_secs"], 30);
        assert!(json["last_failure"].is_null());
    }
}
