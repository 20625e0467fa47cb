//! Domain layer: connection identity, routes, handler contracts and the
//! event system.
//!
//! Everything here is transport-agnostic. The WebSocket layer drives these
//! types; hosts configure them through [`crate::gateway::GatewayBuilder`].

pub mod connection_id;
pub mod connection_registry;
pub mod event_bus;
pub mod gateway_event;
pub mod handler;
pub mod route;

pub use connection_id::ConnectionId;
pub use connection_registry::{ConnectionHandle, ConnectionRegistry, ConnectionSummary};
pub use event_bus::EventBus;
pub use gateway_event::GatewayEvent;
pub use handler::{
    Authenticator, HandlerError, MessageHandler, RouteHandler, RouteRequest, RouteResponse,
    SocketContext,
};
pub use route::{Route, RouteMethod, RouteTable};
