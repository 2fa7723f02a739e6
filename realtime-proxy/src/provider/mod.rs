//! Realtime providers.
//!
//! A provider is an external HTTP service returning next passages at a
//! stop. All providers share the same call path ([`RealtimeProvider`]):
//! response cache, then [`CircuitBreaker`], then HTTP. What differs is how
//! a route point is addressed and how the answer is read, which is the
//! [`WireProtocol`] of each kind:
//!
//! - [`SiriLite`]: SIRI-lite stop monitoring, filtered locally by line and
//!   attributed to routes through destinations
//! - [`Sytral`]: departures API accepting several stops in one call
//! - [`Timeo`]: next-stop-times API answering in local time for today only

mod breaker;
mod client;
mod config;
mod error;
mod protocol;
mod siri_lite;
mod sytral;
mod timeo;

pub use breaker::{BreakerConfig, BreakerState, BreakerStatus, CircuitBreaker};
pub use client::{FailureRecord, ProviderStatus, RealtimeProvider};
pub use config::{ProviderConfig, ProviderKind, RateLimit, TimeoSettings};
pub use error::{BuildError, ErrorKind, ProviderError};
pub use protocol::{PassageQuery, ProviderRequest, WireProtocol};
pub use siri_lite::SiriLite;
pub use sytral::Sytral;
pub use timeo::Timeo;
