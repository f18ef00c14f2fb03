use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use tokio::sync::oneshot;
use tracing::{debug, warn};

struct State {
    permits: usize,
    /// Suspended acquirers, longest-waiting first.
    waiters: VecDeque<oneshot::Sender<()>>,
}

/// A counting semaphore with strict FIFO hand-off.
///
/// `release` hands its permit straight to the longest-waiting acquirer
/// without touching the counter, so a caller arriving later can never
/// overtake one that is already queued. The counter only grows when
/// nobody is waiting, and never past `max_permits`.
pub struct Semaphore {
    max_permits: usize,
    state: Mutex<State>,
}

impl Semaphore {
    /// Create a semaphore with all `max_permits` available.
    pub fn new(max_permits: usize) -> Self {
        Self {
            max_permits,
            state: Mutex::new(State {
                permits: max_permits,
                waiters: VecDeque::new(),
            }),
        }
    }

    /// Acquire one permit, suspending until one is released if none is free.
    ///
    /// There is no timeout. If the returned future is dropped after a permit
    /// was handed to it, the permit is passed on instead of leaking.
    pub async fn acquire(&self) {
        let rx = {
            let mut state = self.state.lock();
            if state.permits > 0 {
                state.permits -= 1;
                return;
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            debug!(waiting = state.waiters.len(), "Semaphore: waiting for permit");
            rx
        };

        let mut pending = PendingAcquire {
            semaphore: self,
            rx: Some(rx),
        };
        pending.wait().await;
    }

    /// Take a permit only if one is free right now.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        if state.permits > 0 {
            state.permits -= 1;
            true
        } else {
            false
        }
    }

    /// Return a permit, waking the longest-waiting acquirer if there is one.
    pub fn release(&self) {
        let mut state = self.state.lock();
        while let Some(waiter) = state.waiters.pop_front() {
            // A closed receiver belongs to a cancelled acquire; skip it.
            if waiter.send(()).is_ok() {
                return;
            }
        }
        if state.permits < self.max_permits {
            state.permits += 1;
        } else {
            warn!(
                max_permits = self.max_permits,
                "Semaphore: release without matching acquire ignored"
            );
        }
    }

    /// Run `f` while holding a permit.
    ///
    /// The permit is released exactly once on every exit path: normal
    /// return, an `Err` output, a panic inside `f`, or the returned future
    /// being dropped mid-flight.
    pub async fn execute<F, Fut, T>(&self, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.acquire().await;
        let _permit = ReleaseOnDrop(self);
        f().await
    }

    /// Wake every waiter and restore full capacity.
    ///
    /// Administrative teardown only: woken waiters proceed as if they had
    /// acquired, so the semaphore may be oversubscribed until they release.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        let woken = state.waiters.len();
        for waiter in state.waiters.drain(..) {
            let _ = waiter.send(());
        }
        state.permits = self.max_permits;
        debug!(woken, "Semaphore: reset");
    }

    /// Permits free right now.
    pub fn available(&self) -> usize {
        self.state.lock().permits
    }

    /// Acquirers currently suspended.
    pub fn waiting(&self) -> usize {
        self.state
            .lock()
            .waiters
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    /// Configured capacity.
    pub fn max_permits(&self) -> usize {
        self.max_permits
    }
}

impl std::fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Semaphore")
            .field("permits", &state.permits)
            .field("max_permits", &self.max_permits)
            .field("waiters", &state.waiters.len())
            .finish()
    }
}

struct PendingAcquire<'a> {
    semaphore: &'a Semaphore,
    rx: Option<oneshot::Receiver<()>>,
}

impl PendingAcquire<'_> {
    async fn wait(&mut self) {
        if let Some(rx) = self.rx.as_mut() {
            // The sender is only ever consumed by `send`, so this resolves Ok.
            let _ = rx.await;
        }
        self.rx = None;
    }
}

impl Drop for PendingAcquire<'_> {
    fn drop(&mut self) {
        if let Some(mut rx) = self.rx.take() {
            rx.close();
            if rx.try_recv().is_ok() {
                self.semaphore.release();
            }
        }
    }
}

struct ReleaseOnDrop<'a>(&'a Semaphore);

impl Drop for ReleaseOnDrop<'_> {
    fn drop(&mut self) {
        self.0.release();
    }
}
