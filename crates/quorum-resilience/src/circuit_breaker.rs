use parking_lot::Mutex;
use quorum_core::QuorumError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// State of a [`CircuitBreaker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Calls pass through; failures are counted.
    Closed,
    /// Calls are rejected until the timeout elapses.
    Open,
    /// Calls pass through on probation; one failure reopens.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Thresholds and timing for a [`CircuitBreaker`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerOptions {
    /// Consecutive failures in `CLOSED` that open the circuit.
    pub failure_threshold: u32,
    /// Consecutive successes in `HALF_OPEN` that close the circuit.
    pub success_threshold: u32,
    /// How long the circuit stays `OPEN` before allowing a probe.
    pub timeout_ms: u64,
    /// Accepted for configuration compatibility. Reopening from
    /// `HALF_OPEN` waits `timeout_ms`, same as the initial trip.
    pub half_open_retry_delay_ms: u64,
}

impl Default for CircuitBreakerOptions {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout_ms: 60_000,
            half_open_retry_delay_ms: 30_000,
        }
    }
}

/// Error returned by [`CircuitBreaker::execute`].
#[derive(Debug)]
pub enum CircuitError<E> {
    /// Rejected without invoking the wrapped operation.
    Open { name: String },
    /// The wrapped operation's own error, unchanged.
    Inner(E),
}

impl<E> CircuitError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, CircuitError::Open { .. })
    }

    /// The wrapped operation's error, if it was invoked and failed.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitError::Inner(e) => Some(e),
            CircuitError::Open { .. } => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for CircuitError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitError::Open { name } => write!(f, "Circuit breaker '{name}' is open"),
            CircuitError::Inner(e) => e.fmt(f),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for CircuitError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CircuitError::Open { .. } => None,
            CircuitError::Inner(e) => e.source(),
        }
    }
}

impl From<CircuitError<QuorumError>> for QuorumError {
    fn from(err: CircuitError<QuorumError>) -> Self {
        match err {
            CircuitError::Open { name } => QuorumError::CircuitOpen { name },
            CircuitError::Inner(e) => e,
        }
    }
}

/// Point-in-time view of a breaker, for dashboards and logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerStats {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    /// Milliseconds until an `OPEN` breaker will admit a probe.
    pub retry_after_ms: Option<u64>,
}

struct Inner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    /// Only meaningful while `OPEN`.
    next_attempt: Option<Instant>,
}

/// Fail-fast guard for one named failure domain (e.g. `"github"`).
///
/// State transitions are evaluated synchronously under a lock, so
/// concurrent callers observe a consistent sequence of counter updates.
/// The lock is never held across the wrapped operation.
pub struct CircuitBreaker {
    name: String,
    options: CircuitBreakerOptions,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, options: CircuitBreakerOptions) -> Self {
        Self {
            name: name.into(),
            options,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                next_attempt: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &CircuitBreakerOptions {
        &self.options
    }

    /// Current state, without evaluating the open timeout.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Poll whether calls should be rejected, transitioning as a side effect.
    ///
    /// This is not a pure query: an `OPEN` breaker whose timeout has elapsed
    /// moves to `HALF_OPEN` here and reports `false`, admitting the caller.
    /// Use [`state`](Self::state) for a read that never transitions.
    pub fn poll_open(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Open {
            return false;
        }
        let due = inner.next_attempt.map_or(true, |at| Instant::now() >= at);
        if due {
            inner.state = CircuitState::HalfOpen;
            inner.success_count = 0;
            inner.next_attempt = None;
            info!(breaker = %self.name, "Circuit half-open, admitting probe");
            false
        } else {
            true
        }
    }

    /// Run `op` through the breaker.
    ///
    /// Rejects with [`CircuitError::Open`] without calling `op` while open.
    /// Otherwise the outcome is recorded and `op`'s own error is returned
    /// unchanged inside [`CircuitError::Inner`].
    pub async fn execute<T, E, F, Fut>(&self, op: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if self.poll_open() {
            debug!(breaker = %self.name, "Circuit open, rejecting call");
            return Err(CircuitError::Open {
                name: self.name.clone(),
            });
        }

        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(CircuitError::Inner(e))
            }
        }
    }

    /// Feed a success into the state machine.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => inner.failure_count = 0,
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.options.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    info!(breaker = %self.name, "Circuit closed");
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Feed a failure into the state machine.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.failure_count += 1;
        match inner.state {
            CircuitState::Closed => {
                if inner.failure_count >= self.options.failure_threshold {
                    self.trip(&mut inner);
                }
            }
            CircuitState::HalfOpen => self.trip(&mut inner),
            CircuitState::Open => {}
        }
    }

    fn trip(&self, inner: &mut Inner) {
        let from = inner.state;
        inner.state = CircuitState::Open;
        inner.success_count = 0;
        inner.next_attempt = Some(Instant::now() + Duration::from_millis(self.options.timeout_ms));
        warn!(
            breaker = %self.name,
            from = %from,
            failures = inner.failure_count,
            timeout_ms = self.options.timeout_ms,
            "Circuit opened"
        );
    }

    /// Force back to `CLOSED` with zeroed counters. Administrative only.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.next_attempt = None;
        info!(breaker = %self.name, "Circuit reset");
    }

    pub fn snapshot(&self) -> BreakerStats {
        let inner = self.inner.lock();
        let retry_after_ms = match (inner.state, inner.next_attempt) {
            (CircuitState::Open, Some(at)) => {
                Some(at.saturating_duration_since(Instant::now()).as_millis() as u64)
            }
            _ => None,
        };
        BreakerStats {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            retry_after_ms,
        }
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn options(failure_threshold: u32, success_threshold: u32, timeout_ms: u64) -> CircuitBreakerOptions {
        CircuitBreakerOptions {
            failure_threshold,
            success_threshold,
            timeout_ms,
            ..Default::default()
        }
    }

    async fn fail(cb: &CircuitBreaker) -> Result<(), CircuitError<String>> {
        cb.execute(|| async { Err::<(), _>("boom".to_string()) }).await
    }

    async fn succeed(cb: &CircuitBreaker) -> Result<(), CircuitError<String>> {
        cb.execute(|| async { Ok::<_, String>(()) }).await
    }

    #[tokio::test]
    async fn test_opens_at_threshold() {
        let cb = CircuitBreaker::new("llm", options(3, 1, 1_000));
        fail(&cb).await.unwrap_err();
        fail(&cb).await.unwrap_err();
        assert_eq!(cb.state(), CircuitState::Closed);
        fail(&cb).await.unwrap_err();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let cb = CircuitBreaker::new("llm", options(2, 1, 1_000));
        fail(&cb).await.unwrap_err();
        succeed(&cb).await.unwrap();
        assert_eq!(cb.snapshot().failure_count, 0);
        fail(&cb).await.unwrap_err();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_inner_error_is_returned_unchanged() {
        let cb = CircuitBreaker::new("llm", options(5, 1, 1_000));
        let err = fail(&cb).await.unwrap_err();
        assert!(!err.is_open());
        assert_eq!(err.into_inner().as_deref(), Some("boom"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_closes_after_successes() {
        let cb = CircuitBreaker::new("github", options(1, 2, 100));
        fail(&cb).await.unwrap_err();
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(!cb.poll_open());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        succeed(&cb).await.unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        succeed(&cb).await.unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().failure_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_discards_progress() {
        let cb = CircuitBreaker::new("github", options(1, 3, 100));
        fail(&cb).await.unwrap_err();
        tokio::time::advance(Duration::from_millis(150)).await;

        succeed(&cb).await.unwrap();
        succeed(&cb).await.unwrap();
        assert_eq!(cb.snapshot().success_count, 2);

        fail(&cb).await.unwrap_err();
        let stats = cb.snapshot();
        assert_eq!(stats.state, CircuitState::Open);
        assert_eq!(stats.success_count, 0);
        assert_eq!(stats.retry_after_ms, Some(100));
    }

    #[test]
    fn test_state_read_does_not_transition() {
        let cb = CircuitBreaker::new("x", options(1, 1, 0));
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        // Timeout of zero is already due, but `state` must not move it.
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.poll_open());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_reset() {
        let cb = CircuitBreaker::new("x", options(1, 1, 60_000));
        cb.record_failure();
        assert!(cb.poll_open());
        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(!cb.poll_open());
        assert_eq!(cb.snapshot().failure_count, 0);
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&CircuitState::HalfOpen).unwrap();
        assert_eq!(json, "\"HALF_OPEN\"");
        assert_eq!(CircuitState::HalfOpen.to_string(), "HALF_OPEN");
    }

    #[test]
    fn test_flatten_into_quorum_error() {
        let open: QuorumError = CircuitError::<QuorumError>::Open {
            name: "github".into(),
        }
        .into();
        assert!(open.is_circuit_open());

        let inner: QuorumError =
            CircuitError::Inner(QuorumError::Workflow("bad".into())).into();
        assert!(matches!(inner, QuorumError::Workflow(_)));
    }
}
