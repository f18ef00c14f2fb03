use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Per-type occupancy of a [`ResourcePool`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub total: usize,
    pub in_use: usize,
    pub available: usize,
}

#[derive(Default)]
struct TypePool {
    /// Pooled identifiers in insertion order.
    ids: Vec<String>,
    in_use: HashSet<String>,
}

/// A pool of reusable resource identifiers, partitioned by resource type.
///
/// The pool never creates resources. On a miss, `acquire` returns `None`
/// and the caller builds a fresh resource, then hands its identifier back
/// through `release` so later callers can reuse it.
pub struct ResourcePool {
    default_max: usize,
    limits: HashMap<String, usize>,
    pools: Mutex<HashMap<String, TypePool>>,
}

impl ResourcePool {
    /// Create a pool that keeps at most `max_per_type` identifiers per type.
    pub fn new(max_per_type: usize) -> Self {
        Self {
            default_max: max_per_type,
            limits: HashMap::new(),
            pools: Mutex::new(HashMap::new()),
        }
    }

    /// Override the maximum for one resource type.
    pub fn with_limit(mut self, resource_type: impl Into<String>, max: usize) -> Self {
        self.limits.insert(resource_type.into(), max);
        self
    }

    /// Maximum pooled identifiers for `resource_type`.
    pub fn limit(&self, resource_type: &str) -> usize {
        self.limits
            .get(resource_type)
            .copied()
            .unwrap_or(self.default_max)
    }

    /// Take a pooled identifier of this type that nobody is using.
    pub fn acquire(&self, resource_type: &str) -> Option<String> {
        let mut pools = self.pools.lock();
        let pool = pools.get_mut(resource_type)?;
        let id = pool
            .ids
            .iter()
            .find(|id| !pool.in_use.contains(*id))?
            .clone();
        pool.in_use.insert(id.clone());
        debug!(resource_type, id = %id, "Pool: reused resource");
        Some(id)
    }

    /// Stop using `id`. Returns `true` if the pool kept it for reuse and
    /// `false` if it was dropped because the type is at capacity.
    pub fn release(&self, resource_type: &str, id: &str) -> bool {
        let max = self.limit(resource_type);
        let mut pools = self.pools.lock();
        let pool = pools.entry(resource_type.to_string()).or_default();
        pool.in_use.remove(id);

        if pool.ids.iter().any(|known| known == id) {
            return true;
        }
        if pool.ids.len() < max {
            pool.ids.push(id.to_string());
            true
        } else {
            debug!(resource_type, id, max, "Pool: at capacity, dropping resource");
            false
        }
    }

    /// Evict `id` entirely, e.g. after it failed permanently.
    /// Returns `false` if the pool did not know it.
    pub fn remove(&self, resource_type: &str, id: &str) -> bool {
        let mut pools = self.pools.lock();
        let Some(pool) = pools.get_mut(resource_type) else {
            return false;
        };
        let was_in_use = pool.in_use.remove(id);
        let before = pool.ids.len();
        pool.ids.retain(|known| known != id);
        was_in_use || pool.ids.len() != before
    }

    /// Occupancy per resource type, sorted by type name.
    pub fn stats(&self) -> BTreeMap<String, PoolStats> {
        let pools = self.pools.lock();
        pools
            .iter()
            .map(|(resource_type, pool)| {
                let total = pool.ids.len();
                let in_use = pool.in_use.len();
                (
                    resource_type.clone(),
                    PoolStats {
                        total,
                        in_use,
                        available: total.saturating_sub(in_use),
                    },
                )
            })
            .collect()
    }
}

impl Default for ResourcePool {
    fn default() -> Self {
        Self::new(10)
    }
}
