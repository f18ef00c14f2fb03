use crate::events::{OrchestratorBus, OrchestratorEvent};
use crate::types::{QueuedTask, Task};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Priority used when the caller has no opinion.
pub const DEFAULT_PRIORITY: i32 = 5;

/// Counts reported by [`TaskQueue::status`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    /// Tasks waiting to be dequeued.
    pub pending: usize,
    /// Tasks dequeued but not yet completed or requeued.
    pub processing: usize,
    /// `pending + processing`.
    pub total: usize,
}

/// A priority-ordered task queue with an explicit processing set.
///
/// `pending` is kept sorted by non-increasing priority, FIFO among equal
/// priorities. A task id lives in at most one of `pending` and
/// `processing`. Unknown ids are reported through `false`/`None`, never
/// as errors, and nothing here retries.
pub struct TaskQueue {
    pending: Vec<QueuedTask>,
    processing: HashMap<Uuid, QueuedTask>,
    events: Option<OrchestratorBus>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            processing: HashMap::new(),
            events: None,
        }
    }

    /// Create a queue that publishes `task:*` and `queue:empty` events.
    pub fn with_events(events: OrchestratorBus) -> Self {
        Self {
            events: Some(events),
            ..Self::new()
        }
    }

    fn emit(&self, event: OrchestratorEvent) {
        if let Some(bus) = &self.events {
            bus.emit(event);
        }
    }

    /// Add a task. Returns `false` and leaves the queue untouched if a task
    /// with the same id is already pending or processing.
    pub fn enqueue(&mut self, task: Task, priority: i32) -> bool {
        if self.contains(task.id) {
            debug!(task_id = %task.id, "Queue: duplicate enqueue ignored");
            return false;
        }
        self.insert(QueuedTask {
            task,
            priority,
            added_at: Utc::now(),
            assigned_to: None,
        });
        true
    }

    /// [`enqueue`](Self::enqueue) at [`DEFAULT_PRIORITY`].
    pub fn enqueue_default(&mut self, task: Task) -> bool {
        self.enqueue(task, DEFAULT_PRIORITY)
    }

    fn insert(&mut self, queued: QueuedTask) {
        // After every entry of equal or higher priority, so ties stay FIFO.
        let position = self
            .pending
            .iter()
            .position(|t| t.priority < queued.priority)
            .unwrap_or(self.pending.len());
        debug!(
            task_id = %queued.id(),
            priority = queued.priority,
            position,
            "Queue: task added"
        );
        self.pending.insert(position, queued.clone());
        self.emit(OrchestratorEvent::TaskAdded(queued));
    }

    /// Take the highest-priority pending task, optionally only among tasks
    /// for `agent_type`, and move it into the processing set.
    pub fn dequeue(&mut self, agent_type: Option<&str>) -> Option<QueuedTask> {
        let index = match agent_type {
            None if self.pending.is_empty() => return None,
            None => 0,
            Some(kind) => self
                .pending
                .iter()
                .position(|t| t.task.agent_type == kind)?,
        };
        let queued = self.pending.remove(index);
        debug!(task_id = %queued.id(), agent_type = %queued.task.agent_type, "Queue: task dequeued");
        self.processing.insert(queued.id(), queued.clone());
        Some(queued)
    }

    /// Record which worker took a processing task.
    pub fn assign(&mut self, id: Uuid, worker_id: impl Into<String>) -> bool {
        let Some(queued) = self.processing.get_mut(&id) else {
            return false;
        };
        queued.assigned_to = Some(worker_id.into());
        let snapshot = queued.clone();
        self.emit(OrchestratorEvent::TaskAssigned(snapshot));
        true
    }

    /// Drop a processing task as done. Emits `queue:empty` when nothing is
    /// left pending or processing.
    pub fn complete(&mut self, id: Uuid) -> bool {
        let Some(queued) = self.processing.remove(&id) else {
            return false;
        };
        self.emit(OrchestratorEvent::TaskCompleted(queued));
        if self.is_empty() {
            self.emit(OrchestratorEvent::QueueEmpty);
        }
        true
    }

    /// Put a processing task back into the pending list one priority lower,
    /// with its assignment cleared.
    pub fn requeue(&mut self, id: Uuid) -> bool {
        let Some(mut queued) = self.processing.remove(&id) else {
            return false;
        };
        queued.assigned_to = None;
        queued.priority = queued.priority.saturating_sub(1);
        queued.added_at = Utc::now();
        self.insert(queued);
        true
    }

    /// The first `limit` pending tasks in dequeue order.
    pub fn peek(&self, limit: usize) -> &[QueuedTask] {
        &self.pending[..limit.min(self.pending.len())]
    }

    /// Tasks currently being processed, oldest first.
    pub fn processing(&self) -> Vec<&QueuedTask> {
        let mut tasks: Vec<&QueuedTask> = self.processing.values().collect();
        tasks.sort_by_key(|t| t.added_at);
        tasks
    }

    /// Look up a task in the processing set.
    pub fn get_processing(&self, id: Uuid) -> Option<&QueuedTask> {
        self.processing.get(&id)
    }

    /// True if the task is waiting in the pending list.
    pub fn is_pending(&self, id: Uuid) -> bool {
        self.pending.iter().any(|t| t.id() == id)
    }

    /// True if the task has been dequeued and not yet finished.
    pub fn is_processing(&self, id: Uuid) -> bool {
        self.processing.contains_key(&id)
    }

    fn contains(&self, id: Uuid) -> bool {
        self.is_processing(id) || self.is_pending(id)
    }

    /// Pending, processing and total counts.
    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            pending: self.pending.len(),
            processing: self.processing.len(),
            total: self.pending.len() + self.processing.len(),
        }
    }

    /// True when nothing is pending or processing.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.processing.is_empty()
    }

    /// Forget every pending and processing task. Emits nothing.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.processing.clear();
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
