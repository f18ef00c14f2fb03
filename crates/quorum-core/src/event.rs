use tokio::sync::broadcast;
use tracing::trace;

/// Default number of buffered events per subscriber before lagging.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// An event with a stable wire name (e.g. `"task:added"`).
pub trait NamedEvent {
    /// The event name an external bridge re-broadcasts under.
    fn name(&self) -> &'static str;
}

/// Fan-out event bus over a broadcast channel.
///
/// Cloning the bus shares the underlying sender, so a queue and a workflow
/// runner built from clones of the same bus publish into one stream.
/// Emitting with no subscribers is not an error.
pub struct EventBus<E> {
    tx: broadcast::Sender<E>,
}

impl<E: Clone + NamedEvent> EventBus<E> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to every event emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.tx.subscribe()
    }

    /// Publish an event to all current subscribers.
    pub fn emit(&self, event: E) {
        trace!(event = event.name(), "emit");
        let _ = self.tx.send(event);
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<E: Clone + NamedEvent> Default for EventBus<E> {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl<E> std::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.tx.receiver_count())
            .finish()
    }
}
