//! Merging provider passages into the base schedule.
//!
//! Within the window a provider covers, its passages replace the base
//! schedule wholesale: every base occurrence inside the window is dropped
//! and the provider's passages are inserted. Base occurrences outside the
//! window are always kept. When the provider is unavailable, or returns
//! nothing, the base schedule is used as is.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{Freshness, Passage, TimeWindow};

/// One entry of a merged schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleEntry {
    pub time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    pub freshness: Freshness,
    /// The base occurrence this entry comes from, for base schedule entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_time: Option<DateTime<Utc>>,
}

impl ScheduleEntry {
    pub fn base(time: DateTime<Utc>) -> Self {
        Self {
            time,
            direction: None,
            freshness: Freshness::BaseSchedule,
            base_time: Some(time),
        }
    }

    pub fn from_passage(passage: Passage) -> Self {
        Self {
            freshness: passage.freshness(),
            time: passage.time,
            direction: passage.direction,
            base_time: None,
        }
    }
}

/// A time-ordered schedule for one route point.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MergedSchedule {
    entries: Vec<ScheduleEntry>,
}

impl MergedSchedule {
    /// The base occurrences, all tagged `base_schedule`.
    pub fn base_only(base: &[DateTime<Utc>]) -> Self {
        let mut entries: Vec<_> = base.iter().copied().map(ScheduleEntry::base).collect();
        entries.sort_by_key(|e| e.time);
        Self { entries }
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScheduleEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keep the first `len` entries.
    pub fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    pub fn has_realtime(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.freshness == Freshness::Realtime)
    }
}

impl<'a> IntoIterator for &'a MergedSchedule {
    type Item = &'a ScheduleEntry;
    type IntoIter = std::slice::Iter<'a, ScheduleEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// What the provider contributed for one route point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeInput {
    /// No provider, no overlap with its active window, or the call failed.
    Unavailable,
    /// The provider answered for `window`.
    Covered {
        window: TimeWindow,
        passages: Vec<Passage>,
    },
}

/// Merge `base` occurrences with what the provider returned.
///
/// `base` is expected to be the occurrences of the queried window. The
/// result is sorted by time; at equal times base entries come first, then
/// provider passages in the order the provider returned them.
pub fn merge(
    base: &[DateTime<Utc>],
    realtime: RealtimeInput,
    items_per_schedule: Option<usize>,
) -> MergedSchedule {
    let mut schedule = match realtime {
        RealtimeInput::Covered { window, passages } if !passages.is_empty() => {
            let mut entries: Vec<_> = base
                .iter()
                .copied()
                .filter(|t| !window.contains(*t))
                .map(ScheduleEntry::base)
                .collect();
            entries.extend(passages.into_iter().map(ScheduleEntry::from_passage));
            entries.sort_by_key(|e| e.time);
            MergedSchedule { entries }
        }
        _ => MergedSchedule::base_only(base),
    };

    if let Some(cap) = items_per_schedule {
        schedule.truncate(cap);
    }
    schedule
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 1, day, h, m, 0).unwrap()
    }

    fn rt(time: DateTime<Utc>) -> Passage {
        Passage::realtime(time, None)
    }

    fn shape(schedule: &MergedSchedule) -> Vec<(DateTime<Utc>, Freshness)> {
        schedule.iter().map(|e| (e.time, e.freshness)).collect()
    }

    fn unbounded(passages: Vec<Passage>) -> RealtimeInput {
        RealtimeInput::Covered {
            window: TimeWindow::new(at(1, 0, 0), at(31, 0, 0)),
            passages,
        }
    }

    #[test]
    fn unavailable_provider_falls_back_to_base() {
        let base = [at(1, 10, 0), at(1, 11, 0), at(1, 12, 0)];
        let merged = merge(&base, RealtimeInput::Unavailable, None);

        assert_eq!(merged.len(), 3);
        assert!(merged.iter().all(|e| e.freshness == Freshness::BaseSchedule));
        assert!(merged.iter().all(|e| e.base_time == Some(e.time)));
    }

    #[test]
    fn empty_provider_answer_falls_back_to_base() {
        let base = [at(1, 10, 0), at(1, 11, 0)];
        let merged = merge(&base, unbounded(vec![]), None);
        assert_eq!(merged, MergedSchedule::base_only(&base));
    }

    #[test]
    fn provider_replaces_everything_in_an_unbounded_window() {
        let base = [at(1, 10, 0), at(1, 11, 0), at(1, 12, 0)];
        let merged = merge(
            &base,
            unbounded(vec![rt(at(1, 10, 5)), rt(at(1, 11, 7))]),
            None,
        );

        assert_eq!(
            shape(&merged),
            vec![
                (at(1, 10, 5), Freshness::Realtime),
                (at(1, 11, 7), Freshness::Realtime),
            ]
        );
        assert!(merged.iter().all(|e| e.base_time.is_none()));
    }

    #[test]
    fn bounded_window_keeps_base_outside() {
        // Base daily at 11:30, provider active for one night to night.
        let base = [at(1, 11, 30), at(2, 11, 30), at(3, 11, 30), at(4, 11, 30)];
        let input = RealtimeInput::Covered {
            window: TimeWindow::new(at(2, 4, 0), at(3, 4, 0)),
            passages: vec![rt(at(2, 6, 0)), rt(at(2, 10, 0))],
        };

        let merged = merge(&base, input, None);

        assert_eq!(
            shape(&merged),
            vec![
                (at(1, 11, 30), Freshness::BaseSchedule),
                (at(2, 6, 0), Freshness::Realtime),
                (at(2, 10, 0), Freshness::Realtime),
                (at(3, 11, 30), Freshness::BaseSchedule),
                (at(4, 11, 30), Freshness::BaseSchedule),
            ]
        );
    }

    #[test]
    fn window_end_is_exclusive() {
        let base = [at(2, 4, 0), at(3, 4, 0)];
        let input = RealtimeInput::Covered {
            window: TimeWindow::new(at(2, 4, 0), at(3, 4, 0)),
            passages: vec![rt(at(2, 6, 0))],
        };

        let merged = merge(&base, input, None);
        assert_eq!(
            shape(&merged),
            vec![
                (at(2, 6, 0), Freshness::Realtime),
                (at(3, 4, 0), Freshness::BaseSchedule),
            ]
        );
    }

    #[test]
    fn theoretical_provider_passages_are_tagged_base_schedule() {
        let merged = merge(
            &[],
            unbounded(vec![Passage::theoretical(at(1, 10, 0), Some("Gare".into()))]),
            None,
        );
        let entry = &merged.entries()[0];
        assert_eq!(entry.freshness, Freshness::BaseSchedule);
        assert_eq!(entry.base_time, None);
        assert_eq!(entry.direction.as_deref(), Some("Gare"));
    }

    #[test]
    fn equal_times_keep_base_first() {
        let base = [at(3, 12, 0)];
        let input = RealtimeInput::Covered {
            window: TimeWindow::new(at(1, 0, 0), at(2, 0, 0)),
            passages: vec![rt(at(3, 12, 0))],
        };

        let merged = merge(&base, input, None);
        assert_eq!(
            shape(&merged),
            vec![
                (at(3, 12, 0), Freshness::BaseSchedule),
                (at(3, 12, 0), Freshness::Realtime),
            ]
        );
    }

    #[test]
    fn items_per_schedule_truncates_after_sorting() {
        let base = [at(1, 9, 0)];
        let input = RealtimeInput::Covered {
            window: TimeWindow::new(at(1, 10, 0), at(1, 20, 0)),
            passages: vec![rt(at(1, 12, 0)), rt(at(1, 11, 0)), rt(at(1, 13, 0))],
        };

        let merged = merge(&base, input, Some(2));
        assert_eq!(
            shape(&merged),
            vec![
                (at(1, 9, 0), Freshness::BaseSchedule),
                (at(1, 11, 0), Freshness::Realtime),
            ]
        );

        let base_only = merge(&[at(1, 9, 0), at(1, 10, 0)], RealtimeInput::Unavailable, Some(1));
        assert_eq!(base_only.len(), 1);
    }

    #[test]
    fn serializes_freshness_verbatim() {
        let merged = merge(&[at(1, 9, 0)], RealtimeInput::Unavailable, None);
        let json = serde_json::to_value(&merged).unwrap();
        assert_eq!(json[0]["freshness"], "base_schedule");
        assert_eq!(json[0]["time"], "2016-01-01T09:00:00Z");
        assert!(json[0].get("direction").is_none());
    }
}
