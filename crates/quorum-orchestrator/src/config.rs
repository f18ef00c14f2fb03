use crate::workflow::WorkflowConfig;
use quorum_concurrency::{ResourcePool, Semaphore};
use quorum_core::{LoggingConfig, QuorumError, QuorumResult};
use quorum_resilience::{BreakerRegistry, CircuitBreakerOptions, RetryOptions};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Concurrency limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencySettings {
    /// Permits of the shared task semaphore.
    pub max_permits: usize,
    /// Default per-type ceiling of the resource pool.
    pub pool_max_per_type: usize,
}

impl Default for ConcurrencySettings {
    fn default() -> Self {
        Self {
            max_permits: 4,
            pool_max_per_type: 10,
        }
    }
}

impl ConcurrencySettings {
    pub fn semaphore(&self) -> Semaphore {
        Semaphore::new(self.max_permits)
    }

    pub fn pool(&self) -> ResourcePool {
        ResourcePool::new(self.pool_max_per_type)
    }
}

/// Top-level configuration file.
///
/// ```toml
/// [logging]
/// level = "debug"
///
/// [retry]
/// max_attempts = 5
///
/// [circuit_breaker]
/// failure_threshold = 3
///
/// [[workflows]]
/// id = "docs"
/// name = "Documentation sync"
/// phases = ["inventory", "analyze", "sync", "adversarial"]
/// ```
///
/// Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuorumConfig {
    pub logging: LoggingConfig,
    pub retry: RetryOptions,
    pub circuit_breaker: CircuitBreakerOptions,
    pub concurrency: ConcurrencySettings,
    pub workflows: Vec<WorkflowConfig>,
}

impl QuorumConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> QuorumResult<Self> {
        let config: QuorumConfig =
            toml::from_str(source).map_err(|e| QuorumError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub async fn load(path: impl AsRef<Path>) -> QuorumResult<Self> {
        let path = path.as_ref();
        let source = tokio::fs::read_to_string(path).await.map_err(|e| {
            QuorumError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config = Self::from_toml_str(&source)?;
        info!(
            path = %path.display(),
            workflows = config.workflows.len(),
            "Config loaded"
        );
        Ok(config)
    }

    pub fn validate(&self) -> QuorumResult<()> {
        if self.retry.backoff_multiplier.is_nan() || self.retry.backoff_multiplier <= 0.0 {
            return Err(QuorumError::Config(format!(
                "retry.backoff_multiplier must be positive, got {}",
                self.retry.backoff_multiplier
            )));
        }
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            return Err(QuorumError::Config(
                "retry.initial_delay_ms must not exceed retry.max_delay_ms".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for workflow in &self.workflows {
            if workflow.id.trim().is_empty() {
                return Err(QuorumError::Config("workflow id must not be empty".to_string()));
            }
            if workflow.phases.is_empty() {
                return Err(QuorumError::Config(format!(
                    "workflow '{}' has no phases",
                    workflow.id
                )));
            }
            if !seen.insert(workflow.id.as_str()) {
                return Err(QuorumError::Config(format!(
                    "duplicate workflow id '{}'",
                    workflow.id
                )));
            }
        }
        Ok(())
    }

    /// A fresh registry whose breakers use the configured defaults.
    pub fn breaker_registry(&self) -> BreakerRegistry {
        BreakerRegistry::new(self.circuit_breaker.clone())
    }

    pub fn workflow(&self, id: &str) -> Option<&WorkflowConfig> {
        self.workflows.iter().find(|w| w.id == id)
    }
}
