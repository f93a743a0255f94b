//! Broadcast event bus for distributing `EngineEvent` to multiple subscribers.
//!
//! Built on `tokio::sync::broadcast`, the `EventBus` supports multiple
//! concurrent subscribers. Publishing with no active subscribers is a no-op.
//! It doubles as the work queue's emit side: `emit` publishes a
//! `EngineEvent::Dispatched` message.

use tessera_types::config::EngineConfig;
use tessera_types::event::{EngineEvent, QueueMessage};
use tokio::sync::broadcast;

/// Multi-consumer bus for engine events.
///
/// Cloning the bus clones the sender, allowing multiple producers and
/// consumers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Bus sized by [`EngineConfig::event_bus_capacity`].
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.event_bus_capacity)
    }

    /// Create a new subscriber that will receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no subscribers, the event is silently dropped.
    pub fn publish(&self, event: EngineEvent) {
        let _ = self.sender.send(event);
    }

    /// Place a message on the work queue.
    pub fn emit(&self, message: QueueMessage) {
        tracing::debug!(direction = %message.direction, "emitting work queue message");
        self.publish(EngineEvent::Dispatched(message));
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}
