//! Merged schedules.
//!
//! [`merge`] combines one route point's base occurrences with what its
//! provider returned. [`ProxyOrchestrator`] runs that over a batch of route
//! points, each resolved to its provider independently.

mod merge;
mod orchestrator;

pub use merge::{MergedSchedule, RealtimeInput, ScheduleEntry, merge};
pub use orchestrator::{
    BatchSchedule, Departure, MergeRequest, OrchestratorConfig, ProxyOrchestrator, RouteSchedule,
};
