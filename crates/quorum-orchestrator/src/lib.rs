//! Task scheduling and adversarial workflow orchestration for Quorum.
//!
//! A [`TaskQueue`] hands out work by priority, a [`Dispatcher`] runs it
//! under a shared permit budget, and a [`WorkflowRunner`] drives a named
//! sequence of phases, re-running `sync` and `adversarial` until the
//! adversarial gate passes or the iteration budget runs out.
//!
//! # Main types
//!
//! - [`TaskQueue`] — Priority queue with an explicit processing set and requeue.
//! - [`Dispatcher`] — Dequeue, assign, and run tasks under a [`quorum_concurrency::Semaphore`].
//! - [`WorkflowRunner`] — Phase pipeline with a bounded reconciliation loop.
//! - [`PhaseExecutor`] — Trait implemented by each pluggable phase.
//! - [`WorkflowReport`] — Verdict, finding counts, and confidence of a finished run.
//! - [`OrchestratorEvent`] — Everything the queue and runner announce.
//! - [`QuorumConfig`] — TOML configuration for all layers.

/// TOML configuration.
pub mod config;
/// Bounded task dispatch.
pub mod dispatcher;
/// Orchestrator events.
pub mod events;
/// Workflow reports.
pub mod report;
/// Priority task queue.
pub mod task_queue;
/// Tasks, findings, and phase results.
pub mod types;
/// Workflow runner.
pub mod workflow;

pub use config::{ConcurrencySettings, QuorumConfig};
pub use dispatcher::Dispatcher;
pub use events::{OrchestratorBus, OrchestratorEvent};
pub use report::{confidence_statement, FindingSummary, ReportSummary, SyncSummary, WorkflowReport};
pub use task_queue::{QueueStatus, TaskQueue, DEFAULT_PRIORITY};
pub use types::{
    Finding, PhaseResult, QueuedTask, Severity, Task, TaskStatus, Verdict, ADVERSARIAL_PHASE,
    SYNC_PHASE,
};
pub use workflow::{
    PhaseExecutor, WorkflowConfig, WorkflowContext, WorkflowRunner, DEFAULT_MAX_ITERATIONS,
};
