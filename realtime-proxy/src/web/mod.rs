//! Operational HTTP surface: liveness and provider health.

mod routes;
mod state;

pub use routes::{RegionStatus, create_router};
pub use state::AppState;
