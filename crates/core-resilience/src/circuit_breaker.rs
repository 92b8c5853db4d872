//! Circuit Breaker implementation for fault tolerance
//!
//! The circuit breaker prevents cascading failures by failing fast when a
//! service is experiencing issues. It has three states:
//! - Closed: Normal operation, requests pass through
//! - Open: Service is unhealthy, requests fail immediately
//! - HalfOpen: Testing if service has recovered; exactly one probe is admitted

use crate::error::{FailureClassification, GuardError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// State of the circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, requests pass through normally
    Closed,
    /// Circuit is open, requests fail immediately until the cooldown elapses
    Open,
    /// Circuit is half-open, a single probe is testing service recovery
    HalfOpen,
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive counted failures before opening the circuit
    pub failure_threshold: usize,
    /// Duration to wait after the last failure before admitting a probe
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
        }
    }
}

/// Internal state of the circuit breaker
///
/// Invariants: `failure_count` resets to 0 on every transition to Closed;
/// `last_failure` is stamped on every counted failure and is the sole input
/// to the cooldown computation.
#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: usize,
    last_failure: Option<Instant>,
    /// Set while the single HalfOpen probe is executing.
    probe_in_flight: bool,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure: None,
            probe_in_flight: false,
        }
    }

    fn remaining_cooldown(&self, cooldown: Duration) -> Duration {
        match self.last_failure {
            Some(at) => cooldown.saturating_sub(at.elapsed()),
            None => Duration::ZERO,
        }
    }
}

/// How a guarded call was admitted through the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Normal,
    Probe,
}

/// Circuit breaker for protecting a single call site against cascading failures
///
/// One breaker instance guards one logical call site; it is explicitly
/// constructed and owned, never a process-wide singleton. Cloning is cheap
/// and shares the same state.
///
/// # Example
/// ```no_run
/// use relay_core_resilience::{CircuitBreaker, CircuitBreakerConfig, FailureClassification};
///
/// #[derive(Debug, thiserror::Error)]
/// #[error("request failed")]
/// struct RequestFailed;
///
/// impl FailureClassification for RequestFailed {}
///
/// # #[tokio::main]
/// # async fn main() {
/// let breaker = CircuitBreaker::new(CircuitBreakerConfig {
///     failure_threshold: 3,
///     cooldown: std::time::Duration::from_secs(30),
/// });
///
/// let result = breaker
///     .guard(|| async { Err::<(), _>(RequestFailed) })
///     .await;
/// assert!(result.is_err());
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: Arc<CircuitBreakerConfig>,
    state: Arc<Mutex<BreakerState>>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config: Arc::new(config),
            state: Arc::new(Mutex::new(BreakerState::new())),
        }
    }

    /// Create a new circuit breaker with default configuration
    pub fn new_default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }

    /// Get the current state of the circuit breaker
    pub async fn state(&self) -> CircuitState {
        self.state.lock().await.state
    }

    /// Get the current counted-failure count
    pub async fn failure_count(&self) -> usize {
        self.state.lock().await.failure_count
    }

    /// Manually reset the circuit breaker to closed state, clearing counters
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.state = CircuitState::Closed;
        state.failure_count = 0;
        state.last_failure = None;
        state.probe_in_flight = false;
        debug!("circuit breaker manually reset to closed");
    }

    /// Execute an operation with circuit breaker protection
    ///
    /// While closed, the operation runs normally. Once counted failures reach
    /// the threshold the circuit opens and calls are rejected with
    /// [`GuardError::Open`] (carrying the remaining cooldown) without invoking
    /// the operation. After the cooldown, exactly one call is admitted as a
    /// probe; its outcome closes or reopens the circuit.
    ///
    /// Failures for which [`FailureClassification::trips_breaker`] returns
    /// `false` propagate unchanged and never touch the failure count. The
    /// breaker performs no retries of its own.
    pub async fn guard<F, Fut, T, E>(&self, op: F) -> Result<T, GuardError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: FailureClassification,
    {
        let admission = match self.admit().await {
            Ok(admission) => admission,
            Err(retry_after) => return Err(GuardError::Open { retry_after }),
        };

        // The wrapped call runs outside the state lock.
        match op().await {
            Ok(result) => {
                self.on_success(admission).await;
                Ok(result)
            }
            Err(e) => {
                if e.trips_breaker() {
                    self.on_failure(admission).await;
                } else if admission == Admission::Probe {
                    // The probe ran but told us nothing about backend health;
                    // stay half-open and allow another probe.
                    self.release_probe().await;
                }
                Err(GuardError::Inner(e))
            }
        }
    }

    /// Check circuit state and decide whether this call may proceed.
    ///
    /// The whole read-check-act sequence holds the lock, so two concurrent
    /// callers can never both be admitted as the half-open probe.
    async fn admit(&self) -> Result<Admission, Duration> {
        let mut state = self.state.lock().await;

        match state.state {
            CircuitState::Closed => Ok(Admission::Normal),
            CircuitState::Open => {
                let remaining = state.remaining_cooldown(self.config.cooldown);
                if remaining.is_zero() {
                    state.state = CircuitState::HalfOpen;
                    state.probe_in_flight = true;
                    debug!("circuit breaker entering half-open, admitting probe");
                    Ok(Admission::Probe)
                } else {
                    Err(remaining)
                }
            }
            CircuitState::HalfOpen => {
                if state.probe_in_flight {
                    // A probe is already executing; reject like an open circuit.
                    Err(state.remaining_cooldown(self.config.cooldown))
                } else {
                    state.probe_in_flight = true;
                    Ok(Admission::Probe)
                }
            }
        }
    }

    /// Handle a successful guarded call
    async fn on_success(&self, admission: Admission) {
        let mut state = self.state.lock().await;

        if admission == Admission::Probe {
            debug!("circuit breaker closing after successful probe");
            state.state = CircuitState::Closed;
            state.probe_in_flight = false;
        }
        state.failure_count = 0;
    }

    /// Handle a counted failure of a guarded call
    async fn on_failure(&self, admission: Admission) {
        let mut state = self.state.lock().await;

        state.failure_count += 1;
        state.last_failure = Some(Instant::now());

        if admission == Admission::Probe {
            warn!("circuit breaker reopening after failed probe");
            state.state = CircuitState::Open;
            state.probe_in_flight = false;
        } else if state.state == CircuitState::Closed
            && state.failure_count >= self.config.failure_threshold
        {
            warn!(
                failures = state.failure_count,
                threshold = self.config.failure_threshold,
                "circuit breaker opening"
            );
            state.state = CircuitState::Open;
        }
    }

    /// Release the probe slot without recording an outcome
    async fn release_probe(&self) {
        let mut state = self.state.lock().await;
        state.probe_in_flight = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use thiserror::Error;

    #[derive(Debug, Error)]
    enum TestError {
        #[error("backend failure")]
        Backend,
        #[error("caller mistake")]
        Caller,
    }

    impl FailureClassification for TestError {
        fn trips_breaker(&self) -> bool {
            matches!(self, TestError::Backend)
        }
    }

    fn breaker(threshold: usize, cooldown: Duration) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: threshold,
            cooldown,
        })
    }

    async fn fail_once(breaker: &CircuitBreaker) {
        let result: Result<(), _> = breaker.guard(|| async { Err(TestError::Backend) }).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn opens_exactly_at_threshold() {
        let breaker = breaker(3, Duration::from_secs(60));

        fail_once(&breaker).await;
        fail_once(&breaker).await;
        assert_eq!(breaker.state().await, CircuitState::Closed);
        assert_eq!(breaker.failure_count().await, 2);

        fail_once(&breaker).await;
        assert_eq!(breaker.state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn success_resets_failure_count() {
        let breaker = breaker(3, Duration::from_secs(60));

        fail_once(&breaker).await;
        fail_once(&breaker).await;
        let result = breaker.guard(|| async { Ok::<_, TestError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(breaker.failure_count().await, 0);
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn open_rejects_without_invoking() {
        let breaker = breaker(1, Duration::from_secs(30));
        fail_once(&breaker).await;
        assert_eq!(breaker.state().await, CircuitState::Open);

        let invocations = AtomicUsize::new(0);
        let result: Result<(), _> = breaker
            .guard(|| async {
                invocations.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Backend)
            })
            .await;

        assert_eq!(invocations.load(Ordering::SeqCst), 0);
        match result {
            Err(GuardError::Open { retry_after }) => {
                assert!(retry_after > Duration::ZERO);
                assert!(retry_after <= Duration::from_secs(30));
            }
            other => panic!("expected open rejection, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn probe_success_closes_circuit() {
        let breaker = breaker(1, Duration::from_secs(5));
        fail_once(&breaker).await;
        assert_eq!(breaker.state().await, CircuitState::Open);

        tokio::time::advance(Duration::from_secs(6)).await;

        let invocations = AtomicUsize::new(0);
        let result = breaker
            .guard(|| async {
                invocations.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TestError>("recovered")
            })
            .await;

        assert_eq!(invocations.load(Ordering::SeqCst), 1);
        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(breaker.state().await, CircuitState::Closed);
        assert_eq!(breaker.failure_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_failure_reopens_circuit() {
        let breaker = breaker(1, Duration::from_secs(5));
        fail_once(&breaker).await;

        tokio::time::advance(Duration::from_secs(6)).await;
        fail_once(&breaker).await;
        assert_eq!(breaker.state().await, CircuitState::Open);

        // last_failure was refreshed by the failed probe, so the next call is
        // rejected again even though the original cooldown has long elapsed.
        tokio::time::advance(Duration::from_secs(3)).await;
        let result: Result<(), _> =
            breaker.guard(|| async { Ok::<_, TestError>(()) }).await;
        assert!(matches!(result, Err(GuardError::Open { .. })));
    }

    #[tokio::test]
    async fn non_tripping_failures_do_not_count() {
        let breaker = breaker(2, Duration::from_secs(60));

        for _ in 0..5 {
            let result: Result<(), _> =
                breaker.guard(|| async { Err(TestError::Caller) }).await;
            assert!(matches!(result, Err(GuardError::Inner(TestError::Caller))));
        }

        assert_eq!(breaker.state().await, CircuitState::Closed);
        assert_eq!(breaker.failure_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_admits_single_probe() {
        let breaker = breaker(1, Duration::from_secs(5));
        fail_once(&breaker).await;
        tokio::time::advance(Duration::from_secs(6)).await;

        let invocations = Arc::new(AtomicUsize::new(0));
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        // First caller is admitted as the probe and parks inside the call.
        let probe = {
            let breaker = breaker.clone();
            let invocations = invocations.clone();
            tokio::spawn(async move {
                breaker
                    .guard(|| async move {
                        invocations.fetch_add(1, Ordering::SeqCst);
                        let _ = release_rx.await;
                        Ok::<_, TestError>(())
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;
        assert_eq!(breaker.state().await, CircuitState::HalfOpen);

        // Second caller must be rejected while the probe is in flight.
        let blocked: Result<(), _> = breaker
            .guard(|| async {
                invocations.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TestError>(())
            })
            .await;
        assert!(matches!(blocked, Err(GuardError::Open { .. })));

        let _ = release_tx.send(());
        probe.await.unwrap().unwrap();
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn reset_returns_to_closed() {
        let breaker = breaker(1, Duration::from_secs(60));
        fail_once(&breaker).await;
        assert_eq!(breaker.state().await, CircuitState::Open);

        breaker.reset().await;
        assert_eq!(breaker.state().await, CircuitState::Closed);
        assert_eq!(breaker.failure_count().await, 0);

        // Usable again immediately after reset.
        let result = breaker.guard(|| async { Ok::<_, TestError>(1) }).await;
        assert_eq!(result.unwrap(), 1);
    }
}
