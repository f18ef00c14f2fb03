//! Concurrency primitives for bounding how much agent work runs at once.
//!
//! # Main types
//!
//! - [`Semaphore`] — Counting semaphore with strict FIFO hand-off to waiters.
//! - [`ResourcePool`] — Per-type pool of reusable resource identifiers.
//! - [`PoolStats`] — Total / in-use / available counts for one resource type.

/// Reusable resource identifier pool.
pub mod pool;
/// FIFO permit semaphore.
pub mod semaphore;

pub use pool::{PoolStats, ResourcePool};
pub use semaphore::Semaphore;
