//! SIRI-lite stop monitoring provider.
//!
//! The endpoint is addressed by stop code only (`{service_url}{stop_code}`)
//! and returns every vehicle visiting the stop. Visits are filtered locally
//! on the line reference, then attributed to routes through their
//! announced destination.
//!
//! ```text
//! curl '{service_url}STIF:StopPoint:Q:41178:'
//! ```

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::domain::{Passage, RoutePassage, RoutePoint};
use crate::engine::RouteMatcher;

use super::error::ProviderError;
use super::protocol::{
    PassageQuery, ProviderRequest, WireProtocol, attribute_destination, no_identifiers,
};

/// SIRI-lite protocol for one provider.
#[derive(Debug, Clone)]
pub struct SiriLite {
    service_url: String,
    object_id_tag: String,
}

impl SiriLite {
    pub fn new(service_url: impl Into<String>, object_id_tag: impl Into<String>) -> Self {
        Self {
            service_url: service_url.into(),
            object_id_tag: object_id_tag.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SiriLiteResponse {
    siri: Siri,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Siri {
    service_delivery: ServiceDelivery,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ServiceDelivery {
    stop_monitoring_delivery: StopMonitoringDelivery,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct StopMonitoringDelivery {
    monitored_stop_visit: Vec<MonitoredStopVisit>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct MonitoredStopVisit {
    monitored_vehicle_journey: MonitoredVehicleJourney,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct MonitoredVehicleJourney {
    line_ref: Value,
    monitored_call: MonitoredCall,
    destination_name: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct MonitoredCall {
    expected_departure_time: Option<String>,
    expected_arrival_time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Value {
    value: Option<String>,
}

/// Parse a SIRI timestamp (`2016-03-29T13:37:00.000Z`, or any RFC 3339).
fn parse_siri_time(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.fZ")
        .ok()
        .map(|dt| dt.and_utc())
}

impl WireProtocol for SiriLite {
    fn build_request(
        &self,
        route_point: &RoutePoint,
        _query: &PassageQuery,
    ) -> Result<ProviderRequest, ProviderError> {
        let stop = route_point.stop_code(&self.object_id_tag);
        // The line code is not sent, but without it nothing could be filtered.
        let line = route_point.line_code(&self.object_id_tag);

        match (stop, line) {
            (Some(stop), Some(_)) => Ok(ProviderRequest::get(format!(
                "{}{}",
                self.service_url, stop
            ))),
            _ => {
                debug!(
                    route_point = ?route_point.key(),
                    stop_code = ?stop,
                    line_code = ?line,
                    "missing realtime id"
                );
                Err(no_identifiers(&self.object_id_tag))
            }
        }
    }

    fn parse_passages(
        &self,
        route_point: &RoutePoint,
        _query: &PassageQuery,
        body: &str,
        matcher: &dyn RouteMatcher,
    ) -> Result<Vec<RoutePassage>, ProviderError> {
        let response: SiriLiteResponse = serde_json::from_str(body)
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        let Some(line_code) = route_point.line_code(&self.object_id_tag) else {
            return Err(no_identifiers(&self.object_id_tag));
        };

        let visits = response
            .siri
            .service_delivery
            .stop_monitoring_delivery
            .monitored_stop_visit;

        let mut passages = Vec::new();
        for visit in visits {
            let journey = visit.monitored_vehicle_journey;
            if journey.line_ref.value.as_deref() != Some(line_code) {
                continue;
            }

            let call = &journey.monitored_call;
            let Some(time) = call
                .expected_departure_time
                .as_deref()
                .or(call.expected_arrival_time.as_deref())
                .and_then(parse_siri_time)
            else {
                debug!(line = line_code, "skipping visit without usable time");
                continue;
            };

            let direction = journey
                .destination_name
                .first()
                .and_then(|d| d.value.clone());

            let routes = attribute_destination(route_point, direction.as_deref(), matcher);
            if routes.is_empty() {
                debug!(destination = ?direction, "no route matches destination, skipping visit");
                continue;
            }
            for route in routes {
                passages.push(RoutePassage::new(
                    route,
                    Passage::realtime(time, direction.clone()),
                ));
            }
        }

        Ok(passages)
    }
}
