//! Error types and failure classification for the resilience primitives

use std::time::Duration;
use thiserror::Error;

/// Decides which errors count as evidence of backend unhealthiness.
///
/// The circuit breaker only records failures for which
/// [`trips_breaker`](FailureClassification::trips_breaker) returns `true`.
/// Everything else propagates unchanged without touching the failure count:
/// a caller-side validation error says nothing about whether the backend is
/// healthy.
///
/// The default implementation counts every error, matching a breaker that
/// treats any failure as a strike.
pub trait FailureClassification {
    /// Whether this failure should count toward the breaker's threshold.
    fn trips_breaker(&self) -> bool {
        true
    }
}

/// Outcome of a guarded call that did not succeed.
///
/// `Open` is the breaker's own rejection: the wrapped operation was never
/// invoked and the caller should back off for at least `retry_after`.
/// `Inner` re-raises the wrapped operation's error unchanged.
#[derive(Debug, Error)]
pub enum GuardError<E> {
    /// The circuit is open; the wrapped operation was not executed.
    #[error("circuit open, retry in {retry_after:?}")]
    Open {
        /// Remaining cooldown before the breaker will admit a probe.
        retry_after: Duration,
    },

    /// The wrapped operation failed with its own error.
    #[error(transparent)]
    Inner(E),
}

impl<E> GuardError<E> {
    /// Whether this is a breaker-open rejection rather than a backend failure.
    pub fn is_open(&self) -> bool {
        matches!(self, GuardError::Open { .. })
    }

    /// The wrapped operation's error, if it ran and failed.
    pub fn into_inner(self) -> Option<E> {
        match self {
            GuardError::Open { .. } => None,
            GuardError::Inner(e) => Some(e),
        }
    }
}
