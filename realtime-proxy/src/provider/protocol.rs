//! The seam between the generic provider call path and each wire format.
//!
//! A protocol knows how to address a route point (build the request) and
//! how to read the provider's answer (parse passages). Transport, circuit
//! breaking and caching are shared and live in [`super::RealtimeProvider`].

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use crate::domain::{RouteId, RoutePassage, RoutePoint};
use crate::engine::RouteMatcher;

use super::error::ProviderError;

/// Parameters of a next-passages query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassageQuery {
    /// Desired number of passages, when the provider can limit server-side.
    pub count: Option<usize>,
    /// Start of the requested period.
    pub from_dt: Option<DateTime<Utc>>,
    /// Wall-clock time of the request.
    pub current_dt: DateTime<Utc>,
    /// Length of the requested period.
    pub duration: Option<Duration>,
}

impl PassageQuery {
    pub fn new(current_dt: DateTime<Utc>) -> Self {
        Self {
            count: None,
            from_dt: None,
            current_dt,
            duration: None,
        }
    }

    pub fn with_count(mut self, count: Option<usize>) -> Self {
        self.count = count;
        self
    }

    pub fn with_from_dt(mut self, from_dt: DateTime<Utc>) -> Self {
        self.from_dt = Some(from_dt);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// A fully addressed provider request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRequest {
    url: String,
}

impl ProviderRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Normalized request signature used in cache keys.
    pub fn signature(&self) -> &str {
        &self.url
    }
}

/// Protocol-specific request building and response parsing.
pub trait WireProtocol: Send + Sync {
    /// Address `route_point` for this provider.
    ///
    /// Fails with `NoIdentifiers` (or `OutOfRange`) when the provider
    /// cannot be asked about this route point; no call is made then.
    fn build_request(
        &self,
        route_point: &RoutePoint,
        query: &PassageQuery,
    ) -> Result<ProviderRequest, ProviderError>;

    /// Extract the passages relevant to `route_point` from a raw body.
    fn parse_passages(
        &self,
        route_point: &RoutePoint,
        query: &PassageQuery,
        body: &str,
        matcher: &dyn RouteMatcher,
    ) -> Result<Vec<RoutePassage>, ProviderError>;
}

/// Routes an entry announcing `destination` should be attributed to.
///
/// Without a destination the entry stays on the route point's own route.
/// A destination matching several routes is attributed to all of them, in
/// the order the matcher returned them; one matching nothing is attributed
/// to none.
pub(crate) fn attribute_destination(
    route_point: &RoutePoint,
    destination: Option<&str>,
    matcher: &dyn RouteMatcher,
) -> Vec<RouteId> {
    let Some(destination) = destination else {
        return vec![route_point.route.clone()];
    };
    let mut seen = HashSet::new();
    matcher
        .matching_routes(&route_point.line, &route_point.stop_point, destination)
        .into_iter()
        .filter(|route| seen.insert(route.clone()))
        .collect()
}

/// Missing-code error for `tag`.
pub(crate) fn no_identifiers(tag: &str) -> ProviderError {
    ProviderError::NoIdentifiers {
        tag: tag.to_string(),
    }
}
