//! Broadcast channel for operational events.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. Connection
//! lifecycle changes and encoding failures are published through the bus;
//! hosts subscribe to observe them.

use chrono::Utc;
use tokio::sync::broadcast;

use super::{ConnectionId, GatewayEvent};

/// Broadcast bus for [`GatewayEvent`]s.
///
/// When the ring buffer is full, the oldest events are dropped for
/// lagging receivers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<GatewayEvent>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of receivers that received the event.
    /// If there are no active receivers, the event is silently dropped.
    pub fn publish(&self, event: GatewayEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Publishes [`GatewayEvent::ConnectionOpened`] stamped with the
    /// current time.
    pub fn connection_opened(&self, connection_id: ConnectionId) -> usize {
        self.publish(GatewayEvent::ConnectionOpened {
            connection_id,
            timestamp: Utc::now(),
        })
    }

    /// Publishes [`GatewayEvent::ConnectionClosed`] stamped with the
    /// current time.
    pub fn connection_closed(&self, connection_id: ConnectionId) -> usize {
        self.publish(GatewayEvent::ConnectionClosed {
            connection_id,
            timestamp: Utc::now(),
        })
    }

    /// Creates a new receiver that will receive all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
