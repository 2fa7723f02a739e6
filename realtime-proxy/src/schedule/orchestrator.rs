//! Batch merging over many route points.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::StreamExt;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::domain::{RoutePoint, RoutePointKey, TimeWindow};
use crate::engine::JourneyEngine;
use crate::provider::PassageQuery;
use crate::registry::ProviderRegistry;

use super::merge::{MergedSchedule, RealtimeInput, ScheduleEntry, merge};

/// Default number of route points processed concurrently.
const DEFAULT_MAX_CONCURRENT: usize = 8;

/// Parameters of a batch merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
    pub from_dt: DateTime<Utc>,
    pub duration: Duration,
    /// Global cap over the whole batch, interleaved by time.
    pub count: Option<usize>,
    /// Cap applied to each route point's schedule.
    pub items_per_schedule: Option<usize>,
    /// Wall-clock time of the request, passed to providers.
    pub current_dt: DateTime<Utc>,
}

impl MergeRequest {
    /// A request for `[from_dt, from_dt + duration)`, issued at `from_dt`.
    pub fn new(from_dt: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            from_dt,
            duration,
            count: None,
            items_per_schedule: None,
            current_dt: from_dt,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_items_per_schedule(mut self, items: usize) -> Self {
        self.items_per_schedule = Some(items);
        self
    }

    pub fn with_current_dt(mut self, current_dt: DateTime<Utc>) -> Self {
        self.current_dt = current_dt;
        self
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow::starting_at(self.from_dt, self.duration)
    }
}

/// The merged schedule of one route point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteSchedule {
    pub route_point: RoutePointKey,
    pub schedule: MergedSchedule,
}

/// One entry of the interleaved departures view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Departure {
    pub route_point: RoutePointKey,
    #[serde(flatten)]
    pub entry: ScheduleEntry,
}

/// Result of a batch merge, in the order route points were given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BatchSchedule {
    schedules: Vec<RouteSchedule>,
}

impl BatchSchedule {
    pub fn get(&self, key: &RoutePointKey) -> Option<&MergedSchedule> {
        self.schedules
            .iter()
            .find(|s| &s.route_point == key)
            .map(|s| &s.schedule)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RouteSchedule> {
        self.schedules.iter()
    }

    pub fn len(&self) -> usize {
        self.schedules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedules.is_empty()
    }

    /// Every entry of the batch in one time-ordered list. Entries at the
    /// same time keep batch order.
    pub fn departures(&self) -> Vec<Departure> {
        let mut departures: Vec<_> = self
            .schedules
            .iter()
            .flat_map(|s| {
                s.schedule.iter().map(|entry| Departure {
                    route_point: s.route_point.clone(),
                    entry: entry.clone(),
                })
            })
            .collect();
        departures.sort_by_key(|d| d.entry.time);
        departures
    }

    /// Keep the `count` earliest entries across the batch.
    ///
    /// Each schedule is cut to a prefix, so per-schedule order is untouched.
    fn truncate_globally(&mut self, count: usize) {
        let mut all: Vec<_> = self
            .schedules
            .iter()
            .enumerate()
            .flat_map(|(s, rs)| {
                rs.schedule
                    .iter()
                    .enumerate()
                    .map(move |(e, entry)| (entry.time, s, e))
            })
            .collect();
        all.sort_unstable();

        let mut kept = vec![0usize; self.schedules.len()];
        for &(_, s, _) in all.iter().take(count) {
            kept[s] += 1;
        }
        for (rs, keep) in self.schedules.iter_mut().zip(kept) {
            rs.schedule.truncate(keep);
        }
    }
}

impl<'a> IntoIterator for &'a BatchSchedule {
    type Item = &'a RouteSchedule;
    type IntoIter = std::slice::Iter<'a, RouteSchedule>;

    fn into_iter(self) -> Self::IntoIter {
        self.schedules.iter()
    }
}

/// Configuration for the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Route points processed at the same time.
    pub max_concurrent: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }
}

impl OrchestratorConfig {
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }
}

/// Produces merged schedules for batches of route points.
///
/// Route points are independent: whatever happens to one provider call only
/// sends that route point back to its base schedule.
pub struct ProxyOrchestrator<E> {
    engine: Arc<E>,
    registry: Arc<ProviderRegistry>,
    config: OrchestratorConfig,
}

impl<E: JourneyEngine> ProxyOrchestrator<E> {
    pub fn new(engine: Arc<E>, registry: Arc<ProviderRegistry>) -> Self {
        Self::with_config(engine, registry, OrchestratorConfig::default())
    }

    pub fn with_config(
        engine: Arc<E>,
        registry: Arc<ProviderRegistry>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            engine,
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Merge every route point of the batch.
    pub async fn merge(&self, route_points: &[RoutePoint], request: &MergeRequest) -> BatchSchedule {
        self.merge_batch(route_points, request, None).await
    }

    /// Like [`Self::merge`], but provider calls still running at `deadline`
    /// are dropped and their route points fall back to the base schedule.
    pub async fn merge_until(
        &self,
        route_points: &[RoutePoint],
        request: &MergeRequest,
        deadline: Instant,
    ) -> BatchSchedule {
        self.merge_batch(route_points, request, Some(deadline)).await
    }

    async fn merge_batch(
        &self,
        route_points: &[RoutePoint],
        request: &MergeRequest,
        deadline: Option<Instant>,
    ) -> BatchSchedule {
        let window = &request.window();
        let schedules = futures::stream::iter(route_points)
            .map(|rp| async move {
                RouteSchedule {
                    route_point: rp.key(),
                    schedule: self.merge_one(rp, request, window, deadline).await,
                }
            })
            .buffered(self.config.max_concurrent.max(1))
            .collect::<Vec<_>>()
            .await;

        let mut batch = BatchSchedule { schedules };
        if let Some(count) = request.count {
            batch.truncate_globally(count);
        }
        batch
    }

    async fn merge_one(
        &self,
        route_point: &RoutePoint,
        request: &MergeRequest,
        window: &TimeWindow,
        deadline: Option<Instant>,
    ) -> MergedSchedule {
        let base = self.engine.base_occurrences(route_point, window);

        let realtime = self.realtime(route_point, request, window);
        let input = match deadline {
            None => realtime.await,
            Some(deadline) => tokio::time::timeout_at(deadline, realtime)
                .await
                .unwrap_or_else(|_| {
                    warn!(route_point = ?route_point.key(), "deadline reached, using base schedule");
                    RealtimeInput::Unavailable
                }),
        };

        merge(&base, input, request.items_per_schedule)
    }

    async fn realtime(
        &self,
        route_point: &RoutePoint,
        request: &MergeRequest,
        window: &TimeWindow,
    ) -> RealtimeInput {
        let Some(provider) = self.registry.resolve(route_point) else {
            return RealtimeInput::Unavailable;
        };
        let Some(covered) = provider.active_window().cover(window) else {
            debug!(rt_system_id = %provider.id(), "query outside provider active window");
            return RealtimeInput::Unavailable;
        };

        let query = PassageQuery::new(request.current_dt)
            .with_count(request.items_per_schedule)
            .with_from_dt(covered.start)
            .with_duration(covered.duration());

        match provider.fetch(route_point, &query, self.engine.as_ref()).await {
            Ok(passages) => RealtimeInput::Covered {
                window: covered,
                passages: passages
                    .into_iter()
                    .filter(|p| p.route == route_point.route)
                    .map(|p| p.passage)
                    .collect(),
            },
            // Already logged and recorded by the provider.
            Err(_) => RealtimeInput::Unavailable,
        }
    }
}
