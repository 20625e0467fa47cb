//! WebSocket layer: wire types, codec, protocol sessions and the
//! transport loop.
//!
//! The WebSocket endpoint (`/ws` by default) carries the request/response
//! protocol: a `hello` handshake, then `request` frames routed through the
//! route table and `message` frames routed to the custom message handler.

pub mod codec;
pub mod connection;
pub mod handler;
pub mod messages;
pub mod session;
