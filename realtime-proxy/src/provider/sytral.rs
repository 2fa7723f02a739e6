//! Sytral-style departures provider.
//!
//! One request covers every stop code of the route point:
//!
//! ```text
//! curl '{service_url}?stop_id=472&stop_id=473&direction_type=forward'
//! ```
//!
//! A single logical line may be split into several lines on the provider
//! side, so every line code under the tag is accepted. Entries typed `"E"`
//! are live; anything else is a theoretical time.

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use crate::domain::{Passage, RoutePassage, RoutePoint};
use crate::engine::RouteMatcher;

use super::error::ProviderError;
use super::protocol::{PassageQuery, ProviderRequest, WireProtocol, no_identifiers};

/// Sytral protocol for one provider.
#[derive(Debug, Clone)]
pub struct Sytral {
    service_url: Url,
    object_id_tag: String,
}

impl Sytral {
    pub fn new(service_url: Url, object_id_tag: impl Into<String>) -> Self {
        Self {
            service_url,
            object_id_tag: object_id_tag.into(),
        }
    }

    fn params(&self, route_point: &RoutePoint) -> Option<Vec<(&'static str, String)>> {
        let stops = route_point.all_stop_codes(&self.object_id_tag);
        if stops.is_empty() || route_point.all_line_codes(&self.object_id_tag).is_empty() {
            return None;
        }
        let mut params: Vec<_> = stops.iter().map(|s| ("stop_id", s.clone())).collect();
        if let Some(direction_type) = &route_point.direction_type {
            params.push(("direction_type", direction_type.clone()));
        }
        Some(params)
    }
}

#[derive(Debug, Default, Deserialize)]
struct DeparturesResponse {
    #[serde(default)]
    departures: Vec<Departure>,
}

#[derive(Debug, Deserialize)]
struct Departure {
    line: String,
    datetime: String,
    direction_name: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl WireProtocol for Sytral {
    fn build_request(
        &self,
        route_point: &RoutePoint,
        _query: &PassageQuery,
    ) -> Result<ProviderRequest, ProviderError> {
        let Some(params) = self.params(route_point) else {
            debug!(route_point = ?route_point.key(), "missing realtime id");
            return Err(no_identifiers(&self.object_id_tag));
        };
        let mut url = self.service_url.clone();
        url.query_pairs_mut().extend_pairs(&params);
        Ok(ProviderRequest::get(url.to_string()))
    }

    fn parse_passages(
        &self,
        route_point: &RoutePoint,
        _query: &PassageQuery,
        body: &str,
        _matcher: &dyn RouteMatcher,
    ) -> Result<Vec<RoutePassage>, ProviderError> {
        let response: DeparturesResponse = serde_json::from_str(body)
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        let line_codes = route_point.all_line_codes(&self.object_id_tag);

        let mut passages = Vec::new();
        for departure in response.departures {
            if !line_codes.contains(&departure.line) {
                continue;
            }
            let Ok(time) = DateTime::parse_from_rfc3339(&departure.datetime) else {
                debug!(datetime = %departure.datetime, "skipping departure with invalid datetime");
                continue;
            };
            let time = time.with_timezone(&Utc);
            let passage = if departure.kind.as_deref() == Some("E") {
                Passage::realtime(time, departure.direction_name)
            } else {
                Passage::theoretical(time, departure.direction_name)
            };
            passages.push(RoutePassage::new(route_point.route.clone(), passage));
        }

        Ok(passages)
    }
}
