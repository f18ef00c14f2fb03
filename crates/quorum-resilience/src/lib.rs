//! Resilience layer: fail-fast circuit breaking and retry with backoff.
//!
//! Both wrap any fallible async operation. Neither swallows errors; the
//! caller always sees the operation's own error type, possibly after
//! retries, or an explicit [`CircuitError::Open`] rejection.
//!
//! # Main types
//!
//! - [`CircuitBreaker`] — `CLOSED` / `OPEN` / `HALF_OPEN` state machine for one failure domain.
//! - [`BreakerRegistry`] — Shared, named breakers created on first use.
//! - [`RetryOptions`] — Attempt budget, backoff curve, and retryable-error matchers.
//! - [`retry_with_backoff`] / [`retry_with_circuit_breaker`] — The retry drivers.

/// Circuit breaker state machine.
pub mod circuit_breaker;
/// Named breaker registry.
pub mod registry;
/// Exponential backoff retry.
pub mod retry;

pub use circuit_breaker::{
    BreakerStats, CircuitBreaker, CircuitBreakerOptions, CircuitError, CircuitState,
};
pub use registry::BreakerRegistry;
pub use retry::{
    compute_backoff, default_retryable_errors, retry_with_backoff, retry_with_circuit_breaker,
    RetryMatcher, RetryOptions, MAX_JITTER,
};
