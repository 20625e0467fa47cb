//! Live connection tracking.
//!
//! [`ConnectionRegistry`] stores a [`ConnectionHandle`] for every open
//! transport. Handles are added when the transport opens and removed when
//! it closes; the registry plays no part in per-message validation. Hosts
//! use it to enumerate connections and push unsolicited messages.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{RwLock, mpsc};
use utoipa::ToSchema;

use super::{ConnectionId, EventBus};
use crate::error::GatewayError;
use crate::ws::codec;
use crate::ws::messages::OutboundEnvelope;

/// Cloneable handle to one connection's outbound side.
///
/// Frames go to the connection's writer task through a bounded channel,
/// so frames from one handle are written in the order they were sent.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    connected_at: DateTime<Utc>,
    outbound: mpsc::Sender<String>,
    closed: Arc<AtomicBool>,
    events: EventBus,
}

impl ConnectionHandle {
    /// Creates a handle with a fresh [`ConnectionId`].
    #[must_use]
    pub fn new(outbound: mpsc::Sender<String>, events: EventBus) -> Self {
        Self {
            id: ConnectionId::new(),
            connected_at: Utc::now(),
            outbound,
            closed: Arc::new(AtomicBool::new(false)),
            events,
        }
    }

    /// Connection identifier.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// When the transport opened.
    #[must_use]
    pub const fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Marks the transport closed. Shared by every clone of the handle.
    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Returns `true` once the transport has closed or the writer is gone.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.outbound.is_closed()
    }

    /// Queues an already-encoded frame for the writer task.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ConnectionClosed`] if the transport is closed.
    pub async fn send_frame(&self, frame: String) -> Result<(), GatewayError> {
        if self.is_closed() {
            return Err(GatewayError::ConnectionClosed(self.id));
        }
        self.outbound
            .send(frame)
            .await
            .map_err(|_| GatewayError::ConnectionClosed(self.id))
    }

    /// Pushes an unsolicited `message` envelope to the client.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Encode`] if the payload cannot be serialized. The
    ///   failure is also published as a
    ///   [`super::GatewayEvent::SerializationFailed`] event and the
    ///   connection stays usable.
    /// - [`GatewayError::ConnectionClosed`] if the transport is closed.
    pub async fn push<P: Serialize>(&self, payload: &P) -> Result<(), GatewayError> {
        let envelope = OutboundEnvelope::push(payload);
        let frame =
            codec::encode_reported(&envelope, envelope.kind.as_str(), self.id, &self.events)?;
        self.send_frame(frame).await
    }

    /// Snapshot for introspection endpoints.
    #[must_use]
    pub const fn summary(&self) -> ConnectionSummary {
        ConnectionSummary {
            connection_id: self.id,
            connected_at: self.connected_at,
        }
    }
}

/// Public view of a live connection.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConnectionSummary {
    /// Connection identifier.
    pub connection_id: ConnectionId,
    /// When the transport opened.
    pub connected_at: DateTime<Utc>,
}

/// Set of live connections for one gateway instance.
///
/// Guarded by a [`tokio::sync::RwLock`]: lifecycle events take the write
/// lock, enumeration takes the read lock.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::ConnectionClosed`] if the handle's transport has
    ///   already closed.
    /// - [`GatewayError::Internal`] if the identifier is already present.
    pub async fn add(&self, handle: ConnectionHandle) -> Result<(), GatewayError> {
        if handle.is_closed() {
            return Err(GatewayError::ConnectionClosed(handle.id()));
        }
        let mut map = self.connections.write().await;
        if map.contains_key(&handle.id()) {
            return Err(GatewayError::Internal(format!(
                "connection {} already registered",
                handle.id()
            )));
        }
        let _ = map.insert(handle.id(), handle);
        Ok(())
    }

    /// Removes a connection, returning its handle if it was present.
    pub async fn remove(&self, connection_id: ConnectionId) -> Option<ConnectionHandle> {
        self.connections.write().await.remove(&connection_id)
    }

    /// Returns the handle for a live connection.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ConnectionNotFound`] if no live connection
    /// has the given identifier.
    pub async fn get(
        &self,
        connection_id: ConnectionId,
    ) -> Result<ConnectionHandle, GatewayError> {
        let map = self.connections.read().await;
        map.get(&connection_id)
            .filter(|handle| !handle.is_closed())
            .cloned()
            .ok_or(GatewayError::ConnectionNotFound(connection_id))
    }

    /// Returns handles for every live connection.
    pub async fn handles(&self) -> Vec<ConnectionHandle> {
        let map = self.connections.read().await;
        map.values()
            .filter(|handle| !handle.is_closed())
            .cloned()
            .collect()
    }

    /// Returns summaries of every live connection, oldest first.
    pub async fn list(&self) -> Vec<ConnectionSummary> {
        let mut summaries: Vec<ConnectionSummary> = self
            .handles()
            .await
            .iter()
            .map(ConnectionHandle::summary)
            .collect();
        summaries.sort_by_key(|s| s.connected_at);
        summaries
    }

    /// Pushes `payload` to every live connection.
    ///
    /// Returns the number of connections the frame was queued for.
    pub async fn broadcast<P: Serialize>(&self, payload: &P) -> usize {
        let mut delivered = 0;
        for handle in self.handles().await {
            match handle.push(payload).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::debug!(
                        connection_id = %handle.id(),
                        error = %e,
                        "broadcast skipped connection"
                    );
                }
            }
        }
        delivered
    }

    /// Number of registered connections.
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Returns `true` if no connection is registered.
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}
