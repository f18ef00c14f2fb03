use crate::circuit_breaker::{BreakerStats, CircuitBreaker, CircuitBreakerOptions};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Named circuit breakers, one per failure domain.
///
/// Construct one at process start and hand clones of the `Arc` to the
/// collaborators that call out to unreliable services. Tests build their
/// own isolated registry.
#[derive(Default)]
pub struct BreakerRegistry {
    defaults: CircuitBreakerOptions,
    overrides: HashMap<String, CircuitBreakerOptions>,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    pub fn new(defaults: CircuitBreakerOptions) -> Self {
        Self {
            defaults,
            overrides: HashMap::new(),
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Use `options` instead of the defaults for the breaker called `name`.
    pub fn with_options(mut self, name: impl Into<String>, options: CircuitBreakerOptions) -> Self {
        self.overrides.insert(name.into(), options);
        self
    }

    /// The breaker for `name`, created on first use and shared afterwards.
    pub fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock();
        breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                let options = self
                    .overrides
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| self.defaults.clone());
                Arc::new(CircuitBreaker::new(name, options))
            })
            .clone()
    }

    /// The breaker for `name`, if one has been created.
    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.lock().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn reset_all(&self) {
        for breaker in self.breakers.lock().values() {
            breaker.reset();
        }
    }

    /// Stats for every breaker, sorted by name.
    pub fn snapshot(&self) -> Vec<BreakerStats> {
        let mut stats: Vec<BreakerStats> = self
            .breakers
            .lock()
            .values()
            .map(|b| b.snapshot())
            .collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitState;

    #[test]
    fn test_same_name_same_breaker() {
        let registry = BreakerRegistry::default();
        let a = registry.get_or_create("github");
        let b = registry.get_or_create("github");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(registry.get("llm").is_none());
    }

    #[test]
    fn test_override_options() {
        let strict = CircuitBreakerOptions {
            failure_threshold: 1,
            ..Default::default()
        };
        let registry = BreakerRegistry::default().with_options("llm", strict);

        assert_eq!(registry.get_or_create("llm").options().failure_threshold, 1);
        assert_eq!(registry.get_or_create("github").options().failure_threshold, 5);
    }

    #[test]
    fn test_reset_all_and_snapshot() {
        let registry = BreakerRegistry::new(CircuitBreakerOptions {
            failure_threshold: 1,
            ..Default::default()
        });
        registry.get_or_create("b").record_failure();
        registry.get_or_create("a").record_failure();
        assert_eq!(registry.names(), vec!["a", "b"]);

        let stats = registry.snapshot();
        assert!(stats.iter().all(|s| s.state == CircuitState::Open));

        registry.reset_all();
        assert!(registry
            .snapshot()
            .iter()
            .all(|s| s.state == CircuitState::Closed));
    }
}
