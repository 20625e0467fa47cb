//! Server-wide gateway configuration.
//!
//! A [`Gateway`] owns everything sessions share: the read-only route
//! table, the optional custom message handler and authenticator, the
//! connection registry and the event bus. Each instance is independent,
//! so several gateways can run in one process.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::domain::handler::{Authenticator, MessageHandler};
use crate::domain::{ConnectionHandle, ConnectionRegistry, EventBus, RouteTable};
use crate::service::{MessageDispatcher, RouteResolver};
use crate::ws::session::SocketSession;

/// Default capacity of the operational event bus.
pub const DEFAULT_EVENT_BUS_CAPACITY: usize = 1024;

/// Shared state for every connection served by one gateway instance.
pub struct Gateway {
    resolver: RouteResolver,
    dispatcher: MessageDispatcher,
    authenticator: Option<Arc<dyn Authenticator>>,
    registry: Arc<ConnectionRegistry>,
    events: EventBus,
}

impl Gateway {
    /// Starts building a gateway.
    #[must_use]
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::default()
    }

    /// Route resolver over the shared route table.
    #[must_use]
    pub const fn resolver(&self) -> &RouteResolver {
        &self.resolver
    }

    /// Custom message dispatcher.
    #[must_use]
    pub const fn dispatcher(&self) -> &MessageDispatcher {
        &self.dispatcher
    }

    /// Handshake authenticator, if configured.
    #[must_use]
    pub fn authenticator(&self) -> Option<&Arc<dyn Authenticator>> {
        self.authenticator.as_ref()
    }

    /// Live connections.
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Operational event bus.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Creates a handle for a new connection whose writer drains `outbound`.
    #[must_use]
    pub fn connection_handle(&self, outbound: mpsc::Sender<String>) -> ConnectionHandle {
        ConnectionHandle::new(outbound, self.events.clone())
    }

    /// Creates the protocol session for a connection, in the
    /// `Connecting` state.
    #[must_use]
    pub fn session(&self, handle: ConnectionHandle) -> SocketSession {
        SocketSession::new(self, handle)
    }
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("resolver", &self.resolver)
            .field("dispatcher", &self.dispatcher)
            .field("authenticator", &self.authenticator.is_some())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Gateway`].
#[derive(Default)]
pub struct GatewayBuilder {
    routes: Option<RouteTable>,
    message_handler: Option<Arc<dyn MessageHandler>>,
    authenticator: Option<Arc<dyn Authenticator>>,
    event_bus_capacity: Option<usize>,
}

impl GatewayBuilder {
    /// Sets the route table. Routes cannot change once the gateway is built.
    #[must_use]
    pub fn routes(mut self, routes: RouteTable) -> Self {
        self.routes = Some(routes);
        self
    }

    /// Sets the single custom message handler.
    #[must_use]
    pub fn on_message(mut self, handler: impl MessageHandler) -> Self {
        self.message_handler = Some(Arc::new(handler));
        self
    }

    /// Sets the handshake authenticator.
    #[must_use]
    pub fn authenticator(mut self, authenticator: impl Authenticator) -> Self {
        self.authenticator = Some(Arc::new(authenticator));
        self
    }

    /// Sets the event bus capacity.
    #[must_use]
    pub const fn event_bus_capacity(mut self, capacity: usize) -> Self {
        self.event_bus_capacity = Some(capacity);
        self
    }

    /// Builds the gateway.
    #[must_use]
    pub fn build(self) -> Gateway {
        let routes = Arc::new(self.routes.unwrap_or_default());
        tracing::debug!(
            routes = routes.len(),
            custom_messages = self.message_handler.is_some(),
            "gateway built"
        );
        Gateway {
            resolver: RouteResolver::new(routes),
            dispatcher: MessageDispatcher::new(self.message_handler),
            authenticator: self.authenticator,
            registry: Arc::new(ConnectionRegistry::new()),
            events: EventBus::new(self.event_bus_capacity.unwrap_or(DEFAULT_EVENT_BUS_CAPACITY)),
        }
    }
}

impl fmt::Debug for GatewayBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayBuilder")
            .field("routes", &self.routes)
            .field("message_handler", &self.message_handler.is_some())
            .field("authenticator", &self.authenticator.is_some())
            .field("event_bus_capacity", &self.event_bus_capacity)
            .finish()
    }
}
