//! Test doubles shared by unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};

use crate::domain::{LineId, RouteId, RoutePoint, StopPointId, TimeWindow};
use crate::engine::{BaseSchedule, RouteMatcher};

/// Route matcher answering from fixed destination and label tables.
#[derive(Debug, Default, Clone)]
pub struct StaticMatcher {
    routes: HashMap<String, Vec<RouteId>>,
    labels: HashMap<(String, String), String>,
}

impl StaticMatcher {
    pub fn with(mut self, destination: &str, routes: &[&str]) -> Self {
        self.routes.insert(
            destination.to_string(),
            routes.iter().map(|r| RouteId::from(*r)).collect(),
        );
        self
    }

    pub fn with_label(mut self, tag: &str, code: &str, label: &str) -> Self {
        self.labels
            .insert((tag.to_string(), code.to_string()), label.to_string());
        self
    }
}

impl RouteMatcher for StaticMatcher {
    fn matching_routes(&self, _line: &LineId, _stop: &StopPointId, destination: &str) -> Vec<RouteId> {
        self.routes.get(destination).cloned().unwrap_or_default()
    }

    fn stop_area_label(&self, _line: &LineId, tag: &str, code: &str) -> Option<String> {
        self.labels.get(&(tag.to_string(), code.to_string())).cloned()
    }
}

/// Journey engine double: fixed base occurrences per route plus a matcher.
#[derive(Debug, Default, Clone)]
pub struct FixedEngine {
    base: HashMap<RouteId, Vec<DateTime<Utc>>>,
    matcher: StaticMatcher,
}

impl FixedEngine {
    pub fn with_base(mut self, route: &str, times: Vec<DateTime<Utc>>) -> Self {
        self.base.insert(RouteId::from(route), times);
        self
    }

    pub fn with_destination(mut self, destination: &str, routes: &[&str]) -> Self {
        self.matcher = self.matcher.with(destination, routes);
        self
    }
}

impl BaseSchedule for FixedEngine {
    fn base_occurrences(&self, route_point: &RoutePoint, window: &TimeWindow) -> Vec<DateTime<Utc>> {
        self.base
            .get(&route_point.route)
            .map(|times| times.iter().copied().filter(|t| window.contains(*t)).collect())
            .unwrap_or_default()
    }
}

impl RouteMatcher for FixedEngine {
    fn matching_routes(&self, line: &LineId, stop: &StopPointId, destination: &str) -> Vec<RouteId> {
        self.matcher.matching_routes(line, stop, destination)
    }

    fn stop_area_label(&self, line: &LineId, tag: &str, code: &str) -> Option<String> {
        self.matcher.stop_area_label(line, tag, code)
    }
}

/// A canned HTTP provider bound to a local port, counting the hits it serves.
pub struct TestServer {
    pub url: String,
    hits: Arc<AtomicUsize>,
}

impl TestServer {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct Canned {
    status: StatusCode,
    body: Arc<str>,
    delay: Option<Duration>,
    hits: Arc<AtomicUsize>,
}

async fn respond(State(canned): State<Canned>) -> (StatusCode, String) {
    canned.hits.fetch_add(1, Ordering::SeqCst);
    if let Some(delay) = canned.delay {
        tokio::time::sleep(delay).await;
    }
    (canned.status, canned.body.to_string())
}

/// Serve `body` with `status` on every path. The returned URL ends with `/`.
pub async fn serve(status: StatusCode, body: &str) -> TestServer {
    serve_with_delay(status, body, None).await
}

pub async fn serve_with_delay(status: StatusCode, body: &str, delay: Option<Duration>) -> TestServer {
    let hits = Arc::new(AtomicUsize::new(0));
    let canned = Canned {
        status,
        body: Arc::from(body),
        delay,
        hits: hits.clone(),
    };
    let app = Router::new().fallback(respond).with_state(canned);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        url: format!("http://{addr}/"),
        hits,
    }
}
