//! Service layer: route resolution and custom message dispatch.
//!
//! Both services turn a validated inbound message into an
//! [`crate::ws::messages::OutboundEnvelope`], or a
//! [`crate::error::ProtocolError`] the session wraps into an error reply.

pub mod message_dispatcher;
pub mod route_resolver;

pub use message_dispatcher::MessageDispatcher;
pub use route_resolver::RouteResolver;
