//! Domain types for the realtime proxy.
//!
//! These types describe what is being asked for (route points over a time
//! window) and what comes back (passages tagged with their freshness).
//! They carry no I/O and are shared by the provider adapters and the
//! schedule merger.

mod ids;
mod passage;
mod route_point;
mod window;

pub use ids::{LineId, ProviderId, RouteId, StopPointId};
pub use passage::{Freshness, Passage, RoutePassage};
pub use route_point::{RoutePoint, RoutePointKey};
pub use window::{ActiveWindow, TimeWindow};
