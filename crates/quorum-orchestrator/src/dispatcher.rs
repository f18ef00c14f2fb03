use crate::task_queue::TaskQueue;
use crate::types::QueuedTask;
use parking_lot::Mutex;
use quorum_concurrency::Semaphore;
use quorum_core::QuorumResult;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Pulls tasks off a shared [`TaskQueue`] and runs them under a shared
/// [`Semaphore`], so at most `max_permits` handlers run at once.
///
/// A handler's `Ok` completes the task; an `Err` requeues it one priority
/// lower. The dispatcher never retries on its own.
#[derive(Clone)]
pub struct Dispatcher {
    queue: Arc<Mutex<TaskQueue>>,
    semaphore: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(queue: Arc<Mutex<TaskQueue>>, semaphore: Arc<Semaphore>) -> Self {
        Self { queue, semaphore }
    }

    pub fn queue(&self) -> &Arc<Mutex<TaskQueue>> {
        &self.queue
    }

    pub fn semaphore(&self) -> &Arc<Semaphore> {
        &self.semaphore
    }

    /// Take the next task (optionally only for `agent_type`), assign it to
    /// `worker_id`, and run `handler` on it while holding a permit.
    ///
    /// Returns `None` when no matching task is pending. A panicking handler
    /// requeues its task before the panic propagates.
    pub async fn dispatch_next<F, Fut, T>(
        &self,
        agent_type: Option<&str>,
        worker_id: &str,
        handler: F,
    ) -> Option<QuorumResult<T>>
    where
        F: FnOnce(QueuedTask) -> Fut,
        Fut: Future<Output = QuorumResult<T>>,
    {
        self.semaphore
            .execute(|| async move {
                let mut queued = {
                    let mut queue = self.queue.lock();
                    let queued = queue.dequeue(agent_type)?;
                    queue.assign(queued.id(), worker_id);
                    queued
                };
                queued.assigned_to = Some(worker_id.to_string());
                let id = queued.id();
                let mut unwind = RequeueOnDrop {
                    queue: &self.queue,
                    id,
                    armed: true,
                };
                info!(
                    task_id = %id,
                    worker_id,
                    agent_type = %queued.task.agent_type,
                    "Dispatcher: running task"
                );

                let outcome = handler(queued).await;
                unwind.armed = false;
                let mut queue = self.queue.lock();
                match &outcome {
                    Ok(_) => {
                        queue.complete(id);
                    }
                    Err(e) => {
                        warn!(
                            task_id = %id,
                            worker_id,
                            error = %e,
                            "Dispatcher: task failed, requeued"
                        );
                        queue.requeue(id);
                    }
                }
                Some(outcome)
            })
            .await
    }
}

// Requeues a task whose handler never returned.
struct RequeueOnDrop<'a> {
    queue: &'a Mutex<TaskQueue>,
    id: Uuid,
    armed: bool,
}

impl Drop for RequeueOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!(task_id = %self.id, "Dispatcher: handler did not finish, requeued");
            self.queue.lock().requeue(self.id);
        }
    }
}
