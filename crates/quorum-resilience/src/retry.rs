use crate::circuit_breaker::{CircuitBreaker, CircuitError};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Upper bound of the random jitter added to each backoff, as a fraction.
pub const MAX_JITTER: f64 = 0.3;

/// Decides whether an error message describes a transient failure.
///
/// Serialized as `{ substring = "..." }` or `{ pattern = "..." }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "MatcherSpec", into = "MatcherSpec")]
pub enum RetryMatcher {
    /// Case-insensitive substring match.
    Substring(String),
    /// Regular expression match against the full message.
    Pattern(Regex),
}

impl RetryMatcher {
    pub fn substring(s: impl Into<String>) -> Self {
        RetryMatcher::Substring(s.into())
    }

    pub fn pattern(re: &str) -> Result<Self, regex::Error> {
        Regex::new(re).map(RetryMatcher::Pattern)
    }

    pub fn matches(&self, message: &str) -> bool {
        match self {
            RetryMatcher::Substring(s) => message.to_lowercase().contains(&s.to_lowercase()),
            RetryMatcher::Pattern(re) => re.is_match(message),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum MatcherSpec {
    Substring(String),
    Pattern(String),
}

impl TryFrom<MatcherSpec> for RetryMatcher {
    type Error = regex::Error;

    fn try_from(spec: MatcherSpec) -> Result<Self, Self::Error> {
        match spec {
            MatcherSpec::Substring(s) => Ok(RetryMatcher::Substring(s)),
            MatcherSpec::Pattern(p) => RetryMatcher::pattern(&p),
        }
    }
}

impl From<RetryMatcher> for MatcherSpec {
    fn from(matcher: RetryMatcher) -> Self {
        match matcher {
            RetryMatcher::Substring(s) => MatcherSpec::Substring(s),
            RetryMatcher::Pattern(re) => MatcherSpec::Pattern(re.as_str().to_string()),
        }
    }
}

/// Matchers for common transient network and HTTP conditions.
pub fn default_retryable_errors() -> Vec<RetryMatcher> {
    let mut matchers: Vec<RetryMatcher> = [
        "connection reset",
        "econnreset",
        "connection refused",
        "timed out",
        "timeout",
        "etimedout",
        "dns error",
        "failed to lookup address",
        "enotfound",
        "too many requests",
    ]
    .into_iter()
    .map(RetryMatcher::substring)
    .collect();

    matchers.extend(
        [r"(?i)rate[\s_-]?limit", r"\b(429|500|502|503|504)\b"]
            .into_iter()
            .filter_map(|p| RetryMatcher::pattern(p).ok()),
    );
    matchers
}

/// Retry budget and backoff curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryOptions {
    /// Total invocations allowed, including the first. Zero behaves as one.
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    /// An error is retried only if its message matches one of these.
    pub retryable_errors: Vec<RetryMatcher>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            retryable_errors: default_retryable_errors(),
        }
    }
}

impl RetryOptions {
    pub fn is_retryable(&self, message: &str) -> bool {
        self.retryable_errors.iter().any(|m| m.matches(message))
    }
}

/// Backoff before the retry that follows failed attempt `attempt` (1-based),
/// without jitter: `min(initial * multiplier^(attempt - 1), max)`.
pub fn compute_backoff(options: &RetryOptions, attempt: u32) -> u64 {
    let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
    let delay = options.initial_delay_ms as f64 * options.backoff_multiplier.powi(exponent);
    if delay.is_nan() {
        return options.max_delay_ms;
    }
    delay.min(options.max_delay_ms as f64).max(0.0) as u64
}

fn with_jitter(delay_ms: u64) -> u64 {
    let factor = rand::thread_rng().gen_range(0.0..=MAX_JITTER);
    delay_ms.saturating_add((delay_ms as f64 * factor) as u64)
}

/// Invoke `op` until it succeeds, fails with a non-retryable error, or the
/// attempt budget runs out.
///
/// The caller gets back exactly the error `op` produced on its last
/// attempt, so wrapping an operation in retries never changes its error
/// type.
pub async fn retry_with_backoff<T, E, F, Fut>(mut op: F, options: &RetryOptions) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let max_attempts = options.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let message = err.to_string();
        if !options.is_retryable(&message) {
            warn!(attempt, error = %message, "Non-retryable error, giving up");
            return Err(err);
        }
        if attempt >= max_attempts {
            warn!(attempt, error = %message, "Retry budget exhausted");
            return Err(err);
        }

        let delay = with_jitter(compute_backoff(options, attempt));
        info!(attempt, delay_ms = delay, error = %message, "Retryable error, backing off");
        tokio::time::sleep(Duration::from_millis(delay)).await;
        attempt += 1;
    }
}

/// Run the whole retry sequence as one call through `breaker`.
///
/// The breaker is consulted once, before the first attempt. A sequence
/// that eventually succeeds counts as one success; one that gives up
/// counts as one failure.
pub async fn retry_with_circuit_breaker<T, E, F, Fut>(
    op: F,
    breaker: &CircuitBreaker,
    options: &RetryOptions,
) -> Result<T, CircuitError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    breaker
        .execute(|| retry_with_backoff(op, options))
        .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn options(max_attempts: u32) -> RetryOptions {
        RetryOptions {
            max_attempts,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            ..Default::default()
        }
    }

    #[test]
    fn test_jitter_saturates_on_huge_delays() {
        assert_eq!(with_jitter(u64::MAX), u64::MAX);
        let half = u64::MAX / 2;
        assert!(with_jitter(half) >= half);
    }

    #[test]
    fn backoff_computation() {
        let opts = options(10);
        assert_eq!(compute_backoff(&opts, 1), 500); // 500 * 2^0
        assert_eq!(compute_backoff(&opts, 2), 1000); // 500 * 2^1
        assert_eq!(compute_backoff(&opts, 3), 2000);
        assert_eq!(compute_backoff(&opts, 6), 16_000);
        assert_eq!(compute_backoff(&opts, 7), 30_000); // capped
        assert_eq!(compute_backoff(&opts, u32::MAX), 30_000);
    }

    #[test]
    fn jitter_stays_within_bound() {
        for _ in 0..100 {
            let d = with_jitter(1_000);
            assert!((1_000..=1_300).contains(&d), "jittered delay {d}");
        }
        assert_eq!(with_jitter(0), 0);
    }

    #[test]
    fn default_matchers_classification() {
        let opts = RetryOptions::default();
        // Retryable
        assert!(opts.is_retryable("Connection reset by peer"));
        assert!(opts.is_retryable("operation timed out"));
        assert!(opts.is_retryable("request Timeout after 30s"));
        assert!(opts.is_retryable("dns error: failed to lookup address information"));
        assert!(opts.is_retryable("Rate limit exceeded"));
        assert!(opts.is_retryable("HTTP 429 Too Many Requests"));
        assert!(opts.is_retryable("upstream returned 503"));
        assert!(opts.is_retryable("500 Internal Server Error"));

        // Not retryable
        assert!(!opts.is_retryable("400 Bad Request"));
        assert!(!opts.is_retryable("invalid api key"));
        assert!(!opts.is_retryable("id 15030 not found"));
    }

    #[test]
    fn matcher_serde_roundtrip() {
        let matchers = vec![
            RetryMatcher::substring("overloaded"),
            RetryMatcher::pattern(r"^E\d+$").unwrap(),
        ];
        let json = serde_json::to_string(&matchers).unwrap();
        assert_eq!(json, r#"[{"substring":"overloaded"},{"pattern":"^E\\d+$"}]"#);

        let parsed: Vec<RetryMatcher> = serde_json::from_str(&json).unwrap();
        assert!(parsed[1].matches("E42"));
        assert!(!parsed[1].matches("xE42"));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let parsed: Result<RetryMatcher, _> = serde_json::from_str(r#"{"pattern":"(unclosed"}"#);
        assert!(parsed.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_runs_once() {
        let mut calls = 0;
        let result: Result<(), String> = retry_with_backoff(
            || {
                calls += 1;
                async { Err("timeout".to_string()) }
            },
            &options(0),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
