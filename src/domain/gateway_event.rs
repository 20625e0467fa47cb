//! Operational events emitted by the gateway.
//!
//! These never reach a client socket. They are published on the
//! [`super::EventBus`] for hosts that want to observe connection
//! lifecycle and encoding failures.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ConnectionId;

/// Operational event published by the gateway core.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// A transport opened and the connection entered the registry.
    ConnectionOpened {
        /// Connection identifier.
        connection_id: ConnectionId,
        /// Open timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A transport closed and the connection left the registry.
    ConnectionClosed {
        /// Connection identifier.
        connection_id: ConnectionId,
        /// Close timestamp.
        timestamp: DateTime<Utc>,
    },

    /// An outbound envelope could not be serialized and was dropped.
    SerializationFailed {
        /// Connection the envelope was addressed to.
        connection_id: ConnectionId,
        /// Classification token: the `type` of the dropped envelope.
        envelope_type: String,
        /// Serializer error text.
        reason: String,
        /// Failure timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl GatewayEvent {
    /// Returns the connection this event concerns.
    #[must_use]
    pub const fn connection_id(&self) -> ConnectionId {
        match self {
            Self::ConnectionOpened { connection_id, .. }
            | Self::ConnectionClosed { connection_id, .. }
            | Self::SerializationFailed { connection_id, .. } => *connection_id,
        }
    }

    /// Returns the event type as a static string.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::ConnectionOpened { .. } => "connection_opened",
            Self::ConnectionClosed { .. } => "connection_closed",
            Self::SerializationFailed { .. } => "serialization_failed",
        }
    }
}
