//! Provider error types.

use std::fmt;

use serde::Serialize;

/// Errors from a realtime provider call.
///
/// None of these ever reach the API layer: every one of them resolves the
/// affected route point to its base schedule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The route point lacks the codes this provider needs. Routine.
    #[error("no realtime identifiers for tag {tag}")]
    NoIdentifiers { tag: String },

    /// The provider cannot answer for the requested period. Routine.
    #[error("request out of provider range: {0}")]
    OutOfRange(String),

    /// The provider's request quota is used up for now. Routine.
    #[error("provider rate limit reached")]
    RateLimited,

    /// The call exceeded the provider timeout.
    #[error("provider call timed out")]
    Timeout,

    /// The circuit breaker rejected the call without contacting the provider.
    #[error("circuit breaker open")]
    BreakerOpen,

    /// Network or HTTP client failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider answered with a non-success status.
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// The body could not be parsed or had an unexpected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// The diagnostic category reported through provider status.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::NoIdentifiers { .. } => ErrorKind::NoIdentifiers,
            ProviderError::OutOfRange(_) => ErrorKind::OutOfRange,
            ProviderError::RateLimited => ErrorKind::RateLimited,
            ProviderError::Timeout => ErrorKind::Timeout,
            ProviderError::BreakerOpen => ErrorKind::BreakerOpen,
            ProviderError::Transport(_) | ProviderError::Status(_) => ErrorKind::TransportError,
            ProviderError::MalformedResponse(_) => ErrorKind::MalformedResponse,
        }
    }

    /// Whether this is expected non-coverage rather than a failure.
    pub fn is_routine(&self) -> bool {
        matches!(
            self,
            ProviderError::NoIdentifiers { .. }
                | ProviderError::OutOfRange(_)
                | ProviderError::RateLimited
        )
    }

    /// Whether the outcome counts against the circuit breaker.
    pub(crate) fn trips_breaker(&self) -> bool {
        matches!(
            self,
            ProviderError::Timeout | ProviderError::Transport(_) | ProviderError::Status(_)
        )
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

/// Errors building a provider from its configuration.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid service url {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("rate limit period too short for {count} calls")]
    InvalidRateLimit { count: u32 },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Error taxonomy exposed to operational tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NoIdentifiers,
    OutOfRange,
    RateLimited,
    Timeout,
    BreakerOpen,
    TransportError,
    MalformedResponse,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NoIdentifiers => "no_identifiers",
            ErrorKind::OutOfRange => "out_of_range",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Timeout => "timeout",
            ErrorKind::BreakerOpen => "breaker_open",
            ErrorKind::TransportError => "transport_error",
            ErrorKind::MalformedResponse => "malformed_response",
        };
        f.write_str(s)
    }
}
