//! # socket-rpc-gateway
//!
//! Request/response protocol over persistent WebSocket connections.
//!
//! Clients open a socket, complete a `hello` handshake and then send
//! correlated `request` frames that are dispatched to registered routes as
//! if they were HTTP requests, or `message` frames handed to a single
//! custom message handler. Every reply echoes the request's `id`.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket, HTTP)
//!     │
//!     ├── WS Handler + transport loop (ws/)
//!     ├── System endpoints (api/)
//!     │
//!     ├── SocketSession (ws/session)
//!     │     ├── Codec (ws/codec)
//!     │     ├── RouteResolver (service/)
//!     │     └── MessageDispatcher (service/)
//!     │
//!     ├── Gateway (routes, handlers, registry)
//!     │
//!     └── ConnectionRegistry + EventBus (domain/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod service;
pub mod ws;
