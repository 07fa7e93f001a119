use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::limits::CHANGE_FEED_CAPACITY;
use crate::model::Booking;

/// What a store subscription delivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// Full authoritative view after a change. Malformed documents are already dropped.
    Snapshot(Arc<Vec<Booking>>),
    /// The store could not deliver a snapshot.
    Error(String),
}

/// Broadcast hub for store change events.
pub struct ChangeFeed {
    sender: broadcast::Sender<StoreEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self {
            sender: broadcast::channel(CHANGE_FEED_CAPACITY).0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }

    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }

    /// Send an event. No-op if nobody is listening.
    pub fn send(&self, event: StoreEvent) {
        let _ = self.sender.send(event);
    }
}

/// Handle for a running listener. Dropping it stops delivery.
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the work.
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Callback form of a store subscription: `on_change` gets every snapshot,
/// `on_error` every delivery error. Must be called inside a tokio runtime.
pub fn listen<C, E>(
    mut rx: broadcast::Receiver<StoreEvent>,
    on_change: C,
    on_error: E,
) -> Subscription
where
    C: Fn(Arc<Vec<Booking>>) + Send + 'static,
    E: Fn(String) + Send + 'static,
{
    let task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(StoreEvent::Snapshot(bookings)) => on_change(bookings),
                Ok(StoreEvent::Error(e)) => on_error(e),
                Err(RecvError::Lagged(skipped)) => {
                    // Snapshots are complete, so the next one supersedes what was missed.
                    tracing::debug!("change feed lagged, skipped {skipped} events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
    Subscription { task }
}
