//! Route points and their provider-specific codes.

use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

use super::{LineId, ProviderId, RouteId, StopPointId};

/// Identity of a route point: one stop point served by one route.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RoutePointKey {
    pub stop_point: StopPointId,
    pub route: RouteId,
}

/// External codes keyed by tag (e.g. `"source"`, `"sirilite_paris"`).
type Codes = HashMap<String, Vec<String>>;

/// A (stop point, route) pair for which passages are requested.
///
/// Carries, for each provider tag, the external codes of the stop point,
/// of the line and of the route. A route point without the codes a
/// provider needs is simply not addressable through that provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePoint {
    pub stop_point: StopPointId,
    pub route: RouteId,
    pub line: LineId,

    /// Provider explicitly designated by the line, overriding tag lookup.
    pub realtime_system: Option<ProviderId>,

    /// Direction type of the route (`"forward"`, `"backward"`), when known.
    pub direction_type: Option<String>,

    stop_codes: Codes,
    line_codes: Codes,
    route_codes: Codes,
}

impl RoutePoint {
    pub fn new(stop_point: StopPointId, route: RouteId, line: LineId) -> Self {
        Self {
            stop_point,
            route,
            line,
            realtime_system: None,
            direction_type: None,
            stop_codes: HashMap::new(),
            line_codes: HashMap::new(),
            route_codes: HashMap::new(),
        }
    }

    /// Add an external code for the stop point. Empty codes are ignored.
    pub fn with_stop_code(mut self, tag: &str, code: &str) -> Self {
        push_code(&mut self.stop_codes, tag, code);
        self
    }

    /// Add an external code for the line. Empty codes are ignored.
    pub fn with_line_code(mut self, tag: &str, code: &str) -> Self {
        push_code(&mut self.line_codes, tag, code);
        self
    }

    /// Add an external code for the route. Empty codes are ignored.
    pub fn with_route_code(mut self, tag: &str, code: &str) -> Self {
        push_code(&mut self.route_codes, tag, code);
        self
    }

    pub fn with_realtime_system(mut self, provider: ProviderId) -> Self {
        self.realtime_system = Some(provider);
        self
    }

    pub fn with_direction_type(mut self, direction_type: impl Into<String>) -> Self {
        self.direction_type = Some(direction_type.into());
        self
    }

    pub fn key(&self) -> RoutePointKey {
        RoutePointKey {
            stop_point: self.stop_point.clone(),
            route: self.route.clone(),
        }
    }

    pub fn stop_code(&self, tag: &str) -> Option<&str> {
        single_code(&self.stop_codes, tag, self.stop_point.as_str())
    }

    pub fn line_code(&self, tag: &str) -> Option<&str> {
        single_code(&self.line_codes, tag, self.line.as_str())
    }

    pub fn route_code(&self, tag: &str) -> Option<&str> {
        single_code(&self.route_codes, tag, self.route.as_str())
    }

    pub fn all_stop_codes(&self, tag: &str) -> &[String] {
        all_codes(&self.stop_codes, tag)
    }

    pub fn all_line_codes(&self, tag: &str) -> &[String] {
        all_codes(&self.line_codes, tag)
    }

    /// Whether any code (stop, line or route) exists under `tag`.
    pub fn has_codes_for(&self, tag: &str) -> bool {
        !self.all_stop_codes(tag).is_empty()
            || !self.all_line_codes(tag).is_empty()
            || !all_codes(&self.route_codes, tag).is_empty()
    }
}

fn push_code(codes: &mut Codes, tag: &str, code: &str) {
    if code.is_empty() {
        return;
    }
    codes.entry(tag.to_string()).or_default().push(code.to_string());
}

fn all_codes<'a>(codes: &'a Codes, tag: &str) -> &'a [String] {
    codes.get(tag).map(Vec::as_slice).unwrap_or(&[])
}

fn single_code<'a>(codes: &'a Codes, tag: &str, owner: &str) -> Option<&'a str> {
    let all = all_codes(codes, tag);
    if all.len() > 1 {
        // Several realtime codes for one object should not happen; the first one wins.
        warn!(object = owner, tag, "object has multiple realtime codes for tag");
    }
    all.first().map(String::as_str)
}
