//! Broadcast bus carrying membership events.
//!
//! The [`EventBus`] is the seam between a membership source (gossip,
//! static configuration, tests) and the components reacting to it. The
//! source calls [`EventBus::emit`]; consumers call [`EventBus::subscribe`]
//! and read from their own [`EventReceiver`].
//!
//! Each subscriber owns an unbounded `tokio::sync::mpsc` queue fed by
//! [`EventBus::emit`], so a slow subscriber never loses membership events;
//! it only falls behind.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::debug;

use crate::ClusterEvent;

/// A cloneable event bus for [`ClusterEvent`]s.
///
/// Emits never block. If nobody is subscribed the event is dropped. Every
/// subscriber receives every event emitted after it subscribed, in order.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<ClusterEvent>>>>,
}

impl EventBus {
    /// Create a bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit an event to all current subscribers.
    ///
    /// Returns the number of subscribers the event was delivered to.
    /// Subscribers whose receiver was dropped are pruned.
    pub fn emit(&self, event: ClusterEvent) -> usize {
        let mut subscribers = self.subscribers.lock().expect("event bus lock poisoned");
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        if subscribers.is_empty() {
            debug!("cluster event dropped, no subscribers");
        }
        subscribers.len()
    }

    /// Subscribe to all events emitted from now on.
    pub fn subscribe(&self) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .expect("event bus lock poisoned")
            .push(tx);
        EventReceiver { rx }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .expect("event bus lock poisoned")
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Receiving half of an [`EventBus`] subscription.
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<ClusterEvent>,
}

impl EventReceiver {
    /// Wait for the next event.
    ///
    /// Returns `None` once every [`EventBus`] clone has been dropped and
    /// the queued events are drained.
    pub async fn recv(&mut self) -> Option<ClusterEvent> {
        self.rx.recv().await
    }
}

impl std::fmt::Debug for EventReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventReceiver")
            .field("pending", &self.rx.len())
            .finish()
    }
}
