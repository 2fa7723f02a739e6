//! Interfaces consumed from the journey-planning engine.
//!
//! The proxy never computes transit topology itself. It asks the engine
//! for the static schedule of a route point, for the routes that lead
//! from a stop towards a destination name, and for the labels of stops
//! that providers only know by code.

use chrono::{DateTime, Utc};

use crate::domain::{LineId, RouteId, RoutePoint, StopPointId, TimeWindow};

/// Source of the statically scheduled passages.
pub trait BaseSchedule: Send + Sync {
    /// Base occurrences of `route_point` within `window`, in ascending order.
    fn base_occurrences(&self, route_point: &RoutePoint, window: &TimeWindow)
    -> Vec<DateTime<Utc>>;
}

/// Resolves what a provider announces about a passage against the network.
pub trait RouteMatcher: Send + Sync {
    /// Routes of `line` that go from `start_stop` towards `destination`.
    ///
    /// Returns an empty vector when nothing matches.
    fn matching_routes(
        &self,
        line: &LineId,
        start_stop: &StopPointId,
        destination: &str,
    ) -> Vec<RouteId>;

    /// Label of the stop area of the stop of `line` known as `code` under
    /// `tag`, if the engine has one.
    fn stop_area_label(&self, _line: &LineId, _tag: &str, _code: &str) -> Option<String> {
        None
    }
}

/// Everything the orchestrator needs from the journey engine.
pub trait JourneyEngine: BaseSchedule + RouteMatcher {}

impl<T: BaseSchedule + RouteMatcher> JourneyEngine for T {}
