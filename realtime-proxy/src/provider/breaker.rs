//! Per-provider circuit breaker.
//!
//! Tracks consecutive failures of one provider and stops calling it once
//! `fail_max` is reached:
//!
//! - **Closed**: calls pass through, failures are counted.
//! - **Open**: calls are rejected without running until `reset_timeout`
//!   has elapsed since the breaker opened.
//! - **Half-open**: a single trial call runs. Success closes the breaker,
//!   failure opens it again and restarts the timer.
//!
//! The state lives behind one lock, so concurrent outcomes against the same
//! provider cannot corrupt the counter or trigger a transition twice.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

use super::error::ProviderError;

/// Default consecutive failures before opening.
const DEFAULT_FAIL_MAX: u32 = 5;

/// Default time spent open before a trial call.
const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(60);

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Configuration for a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive failures that open the breaker.
    pub fail_max: u32,
    /// How long the breaker stays open before allowing a trial call.
    pub reset_timeout: Duration,
}

impl BreakerConfig {
    pub fn new(fail_max: u32, reset_timeout: Duration) -> Self {
        Self {
            fail_max,
            reset_timeout,
        }
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            fail_max: DEFAULT_FAIL_MAX,
            reset_timeout: DEFAULT_RESET_TIMEOUT,
        }
    }
}

/// Snapshot of a breaker for health reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerStatus {
    pub current_state: BreakerState,
    pub fail_counter: u32,
    /// Reset timeout in seconds.
    pub reset_timeout: u64,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    fail_counter: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Failure-isolation state machine owned by one provider.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Create a closed breaker. `name` only appears in logs.
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                fail_counter: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    /// Run `f` through the breaker.
    ///
    /// When the breaker rejects the call, `f` is never invoked and
    /// `ProviderError::BreakerOpen` is returned.
    pub async fn call<T, F, Fut>(&self, f: F) -> Result<T, ProviderError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut permit = self.acquire()?;
        let result = f().await;
        match &result {
            Err(e) if e.trips_breaker() => permit.failure(),
            _ => permit.success(),
        }
        result
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    pub fn status(&self) -> BreakerStatus {
        let inner = self.inner.lock();
        BreakerStatus {
            current_state: inner.state,
            fail_counter: inner.fail_counter,
            reset_timeout: self.config.reset_timeout.as_secs(),
        }
    }

    fn acquire(&self) -> Result<Permit<'_>, ProviderError> {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => Ok(Permit::new(self, false)),
            BreakerState::Open => {
                let elapsed = inner
                    .opened_at
                    .is_some_and(|at| at.elapsed() >= self.config.reset_timeout);
                if !elapsed {
                    return Err(ProviderError::BreakerOpen);
                }
                inner.state = BreakerState::HalfOpen;
                inner.trial_in_flight = true;
                info!(breaker = %self.name, "circuit breaker half-open, trying one call");
                Ok(Permit::new(self, true))
            }
            BreakerState::HalfOpen => {
                if inner.trial_in_flight {
                    return Err(ProviderError::BreakerOpen);
                }
                inner.trial_in_flight = true;
                Ok(Permit::new(self, true))
            }
        }
    }

    fn record_success(&self, trial: bool) {
        let mut inner = self.inner.lock();
        if trial {
            inner.state = BreakerState::Closed;
            inner.fail_counter = 0;
            inner.opened_at = None;
            inner.trial_in_flight = false;
            info!(breaker = %self.name, "circuit breaker closed");
        } else if inner.state == BreakerState::Closed {
            inner.fail_counter = 0;
        }
        // A straggler success from before the breaker opened does not close it.
    }

    fn record_failure(&self, trial: bool) {
        let mut inner = self.inner.lock();
        if trial {
            inner.trial_in_flight = false;
            self.open(&mut inner);
            return;
        }
        if inner.state != BreakerState::Closed {
            return;
        }
        inner.fail_counter += 1;
        if inner.fail_counter >= self.config.fail_max {
            self.open(&mut inner);
        }
    }

    fn release_trial(&self) {
        let mut inner = self.inner.lock();
        if inner.state == BreakerState::HalfOpen {
            inner.trial_in_flight = false;
        }
    }

    fn open(&self, inner: &mut Inner) {
        inner.state = BreakerState::Open;
        inner.opened_at = Some(Instant::now());
        warn!(
            breaker = %self.name,
            fail_counter = inner.fail_counter,
            reset_timeout_secs = self.config.reset_timeout.as_secs(),
            "circuit breaker open"
        );
    }
}

/// Admission to run one call. Dropping it unsettled (e.g. the call was
/// cancelled) frees the half-open trial slot without changing state.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl<'a> Permit<'a> {
    fn new(breaker: &'a CircuitBreaker, trial: bool) -> Self {
        Self {
            breaker,
            trial,
            settled: false,
        }
    }

    fn success(&mut self) {
        self.settled = true;
        self.breaker.record_success(self.trial);
    }

    fn failure(&mut self) {
        self.settled = true;
        self.breaker.record_failure(self.trial);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.release_trial();
        }
    }
}
