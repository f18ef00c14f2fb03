use thiserror::Error;

/// Top-level error type for the Quorum orchestration core.
///
/// Each variant corresponds to a failure class. Not-found conditions are
/// never represented here; those are reported through `bool`/`Option`
/// returns by the component that owns the state.
#[derive(Error, Debug)]
pub enum QuorumError {
    /// A task queue operation was rejected.
    #[error("Queue error: {0}")]
    Queue(String),

    /// A resource pool operation was rejected.
    #[error("Pool error: {0}")]
    Pool(String),

    /// A circuit breaker rejected the call without invoking it.
    #[error("Circuit breaker '{name}' is open")]
    CircuitOpen { name: String },

    /// A retried operation gave up. Carries only the rendered last error.
    #[error("Retry exhausted after {attempts} attempts: {last_error}")]
    RetryExhausted { attempts: u32, last_error: String },

    /// A phase executor failed.
    #[error("Phase '{phase}' failed: {message}")]
    Phase { phase: String, message: String },

    /// A workflow run could not proceed.
    #[error("Workflow error: {0}")]
    Workflow(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl QuorumError {
    /// Shorthand for a [`QuorumError::Phase`] error.
    pub fn phase(phase: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Phase {
            phase: phase.into(),
            message: message.into(),
        }
    }

    /// Whether this error is a fail-fast circuit rejection.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }
}

/// A convenience `Result` alias using [`QuorumError`].
pub type QuorumResult<T> = Result<T, QuorumError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_error_display() {
        let err = QuorumError::phase("adversarial", "LLM returned garbage");
        assert_eq!(
            err.to_string(),
            "Phase 'adversarial' failed: LLM returned garbage"
        );
    }

    #[test]
    fn test_circuit_open_detection() {
        let err = QuorumError::CircuitOpen {
            name: "github".into(),
        };
        assert!(err.is_circuit_open());
        assert!(err.to_string().contains("github"));
        assert!(!QuorumError::Workflow("x".into()).is_circuit_open());
    }

    #[test]
    fn test_from_serde_json() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: QuorumError = parse.unwrap_err().into();
        assert!(matches!(err, QuorumError::Json(_)));
    }
}
