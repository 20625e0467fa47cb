//! Host collaborator contracts: route handlers, the custom message
//! handler and the handshake authenticator.
//!
//! Every handler returns a boxed future resolving to a single
//! `Result`, so a handler completes exactly once with either a value or
//! a [`HandlerError`]. Plain async closures implement these traits
//! through blanket impls.

use std::collections::BTreeMap;
use std::future::Future;

use axum::http::{Method, StatusCode};
use futures_util::future::BoxFuture;
use serde_json::Value;

use super::ConnectionId;

/// Header map carried on requests and responses.
///
/// Ordered so that encoded envelopes are deterministic.
pub type Headers = BTreeMap<String, String>;

/// Future returned by every host handler.
pub type HandlerFuture<T> = BoxFuture<'static, Result<T, HandlerError>>;

/// Identity and context of the socket a handler is serving.
#[derive(Debug, Clone, PartialEq)]
pub struct SocketContext {
    /// Connection identifier.
    pub connection_id: ConnectionId,
    /// Credentials established by the handshake, if any.
    pub credentials: Option<Value>,
}

/// A resolved route call handed to the route's handler.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    /// Connection the request arrived on.
    pub connection_id: ConnectionId,
    /// Effective method (the route's own method for identifier lookups).
    pub method: Method,
    /// Registered path of the resolved route.
    pub path: String,
    /// Request headers sent by the client.
    pub headers: Headers,
    /// Request body sent by the client.
    pub payload: Option<Value>,
    /// Credentials established by the handshake, if any.
    pub credentials: Option<Value>,
}

/// Successful result of a route handler.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteResponse {
    /// Status reported to the client.
    pub status: StatusCode,
    /// Response body.
    pub payload: Value,
    /// Response headers.
    pub headers: Headers,
}

impl RouteResponse {
    /// Creates a `200 OK` response with no headers.
    #[must_use]
    pub fn new(payload: Value) -> Self {
        Self {
            status: StatusCode::OK,
            payload,
            headers: Headers::new(),
        }
    }

    /// Creates a `200 OK` text response.
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self::new(Value::String(body.into()))
            .with_header("content-type", "text/html; charset=utf-8")
    }

    /// Creates a `200 OK` JSON response.
    #[must_use]
    pub fn json(body: Value) -> Self {
        Self::new(body).with_header("content-type", "application/json; charset=utf-8")
    }

    /// Replaces the status code.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Adds or replaces a header. Names are stored lowercase.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        let _ = self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }
}

/// Failure reported by a host handler.
///
/// Only the message text and status reach the client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    status: StatusCode,
    message: String,
}

impl HandlerError {
    /// Creates an error with the default `500 Internal Server Error` status.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Creates an error with an explicit status.
    #[must_use]
    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Creates a `401 Unauthorized` error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::UNAUTHORIZED, message)
    }

    /// Status reported to the client.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Message text reported to the client.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Business logic behind a registered route.
pub trait RouteHandler: Send + Sync + 'static {
    /// Executes the route for one request.
    fn call(&self, request: RouteRequest) -> HandlerFuture<RouteResponse>;
}

impl<F, Fut> RouteHandler for F
where
    F: Fn(RouteRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<RouteResponse, HandlerError>> + Send + 'static,
{
    fn call(&self, request: RouteRequest) -> HandlerFuture<RouteResponse> {
        Box::pin(self(request))
    }
}

/// The single application hook for `message`-type frames.
pub trait MessageHandler: Send + Sync + 'static {
    /// Handles one custom message and produces the reply payload.
    fn on_message(&self, socket: SocketContext, message: Value) -> HandlerFuture<Value>;
}

impl<F, Fut> MessageHandler for F
where
    F: Fn(SocketContext, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    fn on_message(&self, socket: SocketContext, message: Value) -> HandlerFuture<Value> {
        Box::pin(self(socket, message))
    }
}

/// Validates the `auth` field of a `hello` frame.
///
/// Returns the credentials attached to the connection for its lifetime.
pub trait Authenticator: Send + Sync + 'static {
    /// Authenticates one handshake.
    fn authenticate(
        &self,
        connection_id: ConnectionId,
        auth: Option<Value>,
    ) -> HandlerFuture<Option<Value>>;
}

impl<F, Fut> Authenticator for F
where
    F: Fn(ConnectionId, Option<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<Value>, HandlerError>> + Send + 'static,
{
    fn authenticate(
        &self,
        connection_id: ConnectionId,
        auth: Option<Value>,
    ) -> HandlerFuture<Option<Value>> {
        Box::pin(self(connection_id, auth))
    }
}
