//! Half-open time windows.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A half-open interval `[start, end)`.
///
/// A window whose `end` is not after its `start` is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The window `[start, start + duration)`.
    pub fn starting_at(start: DateTime<Utc>, duration: Duration) -> Self {
        let end = start.checked_add_signed(duration).unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }

    pub fn duration(&self) -> Duration {
        if self.is_empty() {
            Duration::zero()
        } else {
            self.end.signed_duration_since(self.start)
        }
    }

    /// Intersection of two windows. May be empty.
    pub fn intersect(&self, other: &TimeWindow) -> TimeWindow {
        TimeWindow {
            start: self.start.max(other.start),
            end: self.end.min(other.end),
        }
    }
}

/// The period during which a provider supersedes the base schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveWindow {
    #[default]
    Unbounded,
    Bounded(TimeWindow),
}

impl ActiveWindow {
    /// The part of `query` this provider is authoritative for, or `None`
    /// when the two do not overlap.
    pub fn cover(&self, query: &TimeWindow) -> Option<TimeWindow> {
        let covered = match self {
            ActiveWindow::Unbounded => *query,
            ActiveWindow::Bounded(window) => window.intersect(query),
        };
        (!covered.is_empty()).then_some(covered)
    }
}

impl From<Option<TimeWindow>> for ActiveWindow {
    fn from(window: Option<TimeWindow>) -> Self {
        window.map_or(ActiveWindow::Unbounded, ActiveWindow::Bounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn contains_is_half_open() {
        let w = TimeWindow::new(at(1, 4), at(2, 4));
        assert!(w.contains(at(1, 4)));
        assert!(w.contains(at(1, 23)));
        assert!(!w.contains(at(2, 4)));
        assert!(!w.contains(at(1, 3)));
    }

    #[test]
    fn intersection_can_be_empty() {
        let a = TimeWindow::new(at(1, 0), at(1, 10));
        let b = TimeWindow::new(at(1, 10), at(1, 12));
        assert!(a.intersect(&b).is_empty());
        assert_eq!(a.intersect(&b).duration(), Duration::zero());

        let c = TimeWindow::new(at(1, 8), at(1, 12));
        assert_eq!(a.intersect(&c), TimeWindow::new(at(1, 8), at(1, 10)));
    }

    #[test]
    fn unbounded_covers_whole_query() {
        let query = TimeWindow::starting_at(at(1, 11), Duration::days(4));
        assert_eq!(ActiveWindow::Unbounded.cover(&query), Some(query));
    }

    #[test]
    fn bounded_cover_clips_to_window() {
        let query = TimeWindow::starting_at(at(1, 11), Duration::days(4));
        let active = ActiveWindow::Bounded(TimeWindow::new(at(2, 4), at(3, 4)));
        assert_eq!(
            active.cover(&query),
            Some(TimeWindow::new(at(2, 4), at(3, 4)))
        );

        let later = ActiveWindow::Bounded(TimeWindow::new(at(10, 0), at(11, 0)));
        assert_eq!(later.cover(&query), None);
    }
}
