//! Timeo next-stop-times provider.
//!
//! The route point is addressed through a `StopDescription` argument
//! wrapped between `?` and `;`, which is why the query string is assembled
//! by hand rather than encoded:
//!
//! ```text
//! {service_url}?a=1&StopDescription=?StopTimeoCode=3331&LineTimeoCode=12&Way=A&NextStopTimeNumber=5&StopTimeType=TR;
//! ```
//!
//! Timeo answers with local wall-clock times only, so it can only be asked
//! about the current local day.

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::domain::{Passage, RoutePassage, RoutePoint};
use crate::engine::RouteMatcher;

use super::config::TimeoSettings;
use super::error::ProviderError;
use super::protocol::{PassageQuery, ProviderRequest, WireProtocol, no_identifiers};

/// Timeo never returns more than this many passages.
const MAX_COUNT: usize = 5;

/// Timeo protocol for one provider.
#[derive(Debug, Clone)]
pub struct Timeo {
    service_url: String,
    object_id_tag: String,
    settings: TimeoSettings,
}

impl Timeo {
    pub fn new(
        service_url: impl Into<String>,
        object_id_tag: impl Into<String>,
        settings: TimeoSettings,
    ) -> Self {
        Self {
            service_url: service_url.into(),
            object_id_tag: object_id_tag.into(),
            settings,
        }
    }

    /// `from_dt` floored to the configured step, as a local timestamp.
    fn reference_time(&self, from_dt: DateTime<Utc>) -> String {
        let step = self.settings.from_datetime_step.as_secs() as i64;
        let ts = from_dt.timestamp();
        let floored = if step > 0 { ts - ts.rem_euclid(step) } else { ts };
        DateTime::from_timestamp(floored, 0)
            .unwrap_or(from_dt)
            .with_timezone(&self.settings.timezone)
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string()
    }

    fn is_after_today(&self, query: &PassageQuery) -> bool {
        let Some(from_dt) = query.from_dt else {
            return false;
        };
        let tz = &self.settings.timezone;
        from_dt.with_timezone(tz).date_naive() > query.current_dt.with_timezone(tz).date_naive()
    }

    /// Stop area label of the terminus when known, else the announced
    /// destination.
    fn direction(
        &self,
        route_point: &RoutePoint,
        next: &NextExpectedStopTime,
        matcher: &dyn RouteMatcher,
    ) -> Option<String> {
        let label = match (&self.settings.destination_id_tag, &next.terminus) {
            (Some(tag), Some(code)) => matcher.stop_area_label(&route_point.line, tag, code),
            _ => None,
        };
        label
            .filter(|l| !l.is_empty())
            .or_else(|| next.destination.clone())
    }

    /// Attach a local `HH:MM:SS` to the current local day.
    fn to_utc(&self, hour: &str, current_dt: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let time = NaiveTime::parse_from_str(hour, "%H:%M:%S").ok()?;
        let tz = &self.settings.timezone;
        let local = current_dt.with_timezone(tz).date_naive().and_time(time);
        tz.from_local_datetime(&local)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TimeoResponse {
    #[serde(default)]
    stop_times_response: Vec<StopTimesResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StopTimesResponse {
    next_stop_times_message: NextStopTimesMessage,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct NextStopTimesMessage {
    next_expected_stop_time: Vec<NextExpectedStopTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NextExpectedStopTime {
    next_stop: String,
    destination: Option<String>,
    terminus: Option<String>,
}

impl WireProtocol for Timeo {
    fn build_request(
        &self,
        route_point: &RoutePoint,
        query: &PassageQuery,
    ) -> Result<ProviderRequest, ProviderError> {
        if self.is_after_today(query) {
            return Err(ProviderError::OutOfRange(
                "Timeo cannot be called for a later day".to_string(),
            ));
        }

        let tag = &self.object_id_tag;
        let (Some(stop), Some(line), Some(route)) = (
            route_point.stop_code(tag),
            route_point.line_code(tag),
            route_point.route_code(tag),
        ) else {
            debug!(
                route_point = ?route_point.key(),
                stop_code = ?route_point.stop_code(tag),
                line_code = ?route_point.line_code(tag),
                route_code = ?route_point.route_code(tag),
                "missing realtime id"
            );
            return Err(no_identifiers(tag));
        };

        let count = query.count.unwrap_or(MAX_COUNT).min(MAX_COUNT);
        let reference = query
            .from_dt
            .map(|dt| format!("&NextStopReferenceTime={}", self.reference_time(dt)))
            .unwrap_or_default();

        let stop_description = format!(
            "StopDescription=?StopTimeoCode={stop}&LineTimeoCode={line}&Way={route}\
             &NextStopTimeNumber={count}&StopTimeType=TR{reference};"
        );

        let mut params: Vec<String> = self
            .settings
            .service_args
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        params.push(stop_description);

        Ok(ProviderRequest::get(format!(
            "{}?{}",
            self.service_url,
            params.join("&")
        )))
    }

    fn parse_passages(
        &self,
        route_point: &RoutePoint,
        query: &PassageQuery,
        body: &str,
        matcher: &dyn RouteMatcher,
    ) -> Result<Vec<RoutePassage>, ProviderError> {
        let response: TimeoResponse = serde_json::from_str(body)
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        // Exactly one StopTimesResponse per StopDescription.
        let [stop_times] = <[StopTimesResponse; 1]>::try_from(response.stop_times_response)
            .map_err(|responses| {
                ProviderError::MalformedResponse(format!(
                    "expected one StopTimesResponse, got {}",
                    responses.len()
                ))
            })?;

        let mut passages = Vec::new();
        for next in stop_times.next_stop_times_message.next_expected_stop_time {
            let Some(time) = self.to_utc(&next.next_stop, query.current_dt) else {
                debug!(next_stop = %next.next_stop, "skipping unusable Timeo time");
                continue;
            };
            let direction = self.direction(route_point, &next, matcher);
            passages.push(RoutePassage::new(
                route_point.route.clone(),
                Passage::realtime(time, direction),
            ));
        }
        Ok(passages)
    }
}
