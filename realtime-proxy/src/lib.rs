//! Realtime schedule proxy.
//!
//! Answers "when are the next vehicles at this stop?" by merging a base
//! timetable with live passages from external realtime providers. Each
//! route point is served by at most one provider; whenever that provider
//! cannot answer, the base timetable is returned instead.

pub mod cache;
pub mod config;
pub mod domain;
pub mod engine;
pub mod provider;
pub mod registry;
pub mod schedule;
pub mod web;

#[cfg(test)]
mod testing;
