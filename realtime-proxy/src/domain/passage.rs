//! Passages and freshness tags.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::RouteId;

/// A single arrival or departure event at a stop point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Passage {
    /// When the vehicle passes.
    pub time: DateTime<Utc>,

    /// Destination label announced by the provider, if any.
    pub direction: Option<String>,

    /// Whether the provider reported this time as live.
    /// Some providers mix theoretical times into their feeds.
    pub is_realtime: bool,
}

impl Passage {
    /// Create a live passage.
    pub fn realtime(time: DateTime<Utc>, direction: Option<String>) -> Self {
        Self {
            time,
            direction,
            is_realtime: true,
        }
    }

    /// Create a passage the provider flagged as theoretical.
    pub fn theoretical(time: DateTime<Utc>, direction: Option<String>) -> Self {
        Self {
            time,
            direction,
            is_realtime: false,
        }
    }

    /// The freshness tag surfaced to clients for this passage.
    pub fn freshness(&self) -> Freshness {
        if self.is_realtime {
            Freshness::Realtime
        } else {
            Freshness::BaseSchedule
        }
    }
}

/// A provider passage attributed to one route.
///
/// A single provider entry whose destination is served by several routes
/// yields one `RoutePassage` per route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePassage {
    pub route: RouteId,
    pub passage: Passage,
}

impl RoutePassage {
    pub fn new(route: RouteId, passage: Passage) -> Self {
        Self { route, passage }
    }
}

/// Where a merged schedule entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    BaseSchedule,
    Realtime,
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Freshness::BaseSchedule => f.write_str("base_schedule"),
            Freshness::Realtime => f.write_str("realtime"),
        }
    }
}
