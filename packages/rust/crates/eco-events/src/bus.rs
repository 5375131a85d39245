//! Broadcast event bus with callback listeners.

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::{EngineEvent, EventKind, topics};

/// Async event bus owned by one engine instance.
///
/// Uses `tokio::sync::broadcast` channel for:
/// - Thread-safe 1-to-Many fan-out
/// - Non-blocking publish
/// - Automatic cleanup on receiver drop
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
    capacity: usize,
}

/// Registration returned by [`EventBus::on`].
///
/// Dropping it (or calling [`ListenerHandle::cancel`]) unregisters the
/// listener.
#[derive(Debug)]
pub struct ListenerHandle {
    task: JoinHandle<()>,
}

impl ListenerHandle {
    /// Stop delivering events to this listener.
    pub fn cancel(self) {
        drop(self);
    }

    /// True once the listener task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl EventBus {
    /// Create a new event bus with specified capacity (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Get the bus capacity
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Publish an event to all subscribers
    ///
    /// Returns the number of subscribers who received the event.
    /// Returns 0 if there are no subscribers (not an error).
    pub fn publish(&self, event: EngineEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Wrap `kind` in an envelope for `session_id` and publish it.
    pub fn emit(&self, session_id: &str, kind: EventKind) -> usize {
        self.publish(EngineEvent::new(session_id, kind))
    }

    /// Subscribe to the event bus
    ///
    /// Returns a receiver that will receive all future events.
    /// Dropping the receiver automatically unsubscribes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Get current subscriber count
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Register a callback for every event accepted by `filter`.
    ///
    /// The subscription is taken before this returns, so events published
    /// afterwards are never missed. The callback runs on a spawned task; a
    /// listener that falls behind skips the lost events and keeps going.
    ///
    /// Must be called from within a tokio runtime.
    pub fn on<F, C>(&self, filter: F, mut callback: C) -> ListenerHandle
    where
        F: Fn(&EngineEvent) -> bool + Send + 'static,
        C: FnMut(&EngineEvent) + Send + 'static,
    {
        let mut rx = self.tx.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if filter(&event) {
                            callback(&event);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "event listener lagged; skipping ahead");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        ListenerHandle { task }
    }

    /// Register a callback for one topic.
    pub fn on_topic<C>(&self, topic: &'static str, callback: C) -> ListenerHandle
    where
        C: FnMut(&EngineEvent) + Send + 'static,
    {
        self.on(move |event| event.topic() == topic, callback)
    }

    /// Listener for published windows.
    pub fn on_data_ready<C>(&self, callback: C) -> ListenerHandle
    where
        C: FnMut(&EngineEvent) + Send + 'static,
    {
        self.on_topic(topics::DATA_READY, callback)
    }

    /// Listener for fetch progress.
    pub fn on_progress<C>(&self, callback: C) -> ListenerHandle
    where
        C: FnMut(&EngineEvent) + Send + 'static,
    {
        self.on_topic(topics::PROGRESS, callback)
    }

    /// Listener for source failures.
    pub fn on_error<C>(&self, callback: C) -> ListenerHandle
    where
        C: FnMut(&EngineEvent) + Send + 'static,
    {
        self.on_topic(topics::SOURCE_ERROR, callback)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
