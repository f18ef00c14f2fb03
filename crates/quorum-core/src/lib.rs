//! Core types shared across the Quorum orchestration crates.
//!
//! This crate provides the foundational pieces every other Quorum crate
//! builds on: the unified error type, a broadcast-based event bus, and
//! tracing subscriber setup.
//!
//! # Main types
//!
//! - [`QuorumError`] — Unified error enum for all Quorum subsystems.
//! - [`QuorumResult`] — Convenience alias for `Result<T, QuorumError>`.
//! - [`EventBus`] — Cloneable fan-out of named events to subscribers.
//! - [`LoggingConfig`] — Log level and format, consumed by [`init_tracing`].

/// Unified error type.
pub mod error;
/// Broadcast event bus.
pub mod event;
/// Tracing subscriber setup.
pub mod telemetry;

pub use error::{QuorumError, QuorumResult};
pub use event::{EventBus, NamedEvent, DEFAULT_EVENT_CAPACITY};
pub use telemetry::{init_tracing, LoggingConfig};
