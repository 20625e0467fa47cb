//! Gateway error types.
//!
//! Two layers of errors live here:
//!
//! - [`GatewayError`] is the server-side error for configuration, route
//!   registration and connection management. It maps to an HTTP status
//!   and a structured JSON body for the system endpoints.
//! - [`ProtocolError`] is the wire-level taxonomy. Every variant becomes a
//!   structured error envelope on the socket; none of them terminate the
//!   connection.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::domain::ConnectionId;
use crate::domain::handler::HandlerError;

/// Structured JSON error response body for HTTP endpoints.
///
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "connection not found: 1f0c..."
///   }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category           | HTTP Status                 |
/// |-----------|--------------------|-----------------------------|
/// | 1000–1999 | Route registration | 400 Bad Request             |
/// | 2000–2999 | Connection state   | 404 Not Found / 410 Gone    |
/// | 3000–3999 | Server             | 500 Internal Server Error   |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// A route path did not start with `/`.
    #[error("invalid route path: {0}")]
    InvalidRoutePath(String),

    /// Two routes were registered with the same identifier.
    #[error("duplicate route id: {0}")]
    DuplicateRouteId(String),

    /// Two routes were registered for the same method and path.
    #[error("duplicate route: {method} {path}")]
    DuplicateRoute {
        /// Method of the conflicting registration (`*` for wildcard).
        method: String,
        /// Path of the conflicting registration.
        path: String,
    },

    /// A method string could not be parsed as an HTTP method.
    #[error("invalid method: {0}")]
    InvalidMethod(String),

    /// No live connection carries the given identifier.
    #[error("connection not found: {0}")]
    ConnectionNotFound(ConnectionId),

    /// The connection's transport is already closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(ConnectionId),

    /// An outbound envelope could not be serialized.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRoutePath(_) => 1001,
            Self::DuplicateRouteId(_) => 1002,
            Self::DuplicateRoute { .. } => 1003,
            Self::InvalidMethod(_) => 1004,
            Self::ConnectionNotFound(_) => 2001,
            Self::ConnectionClosed(_) => 2002,
            Self::Encode(_) => 3001,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRoutePath(_)
            | Self::DuplicateRouteId(_)
            | Self::DuplicateRoute { .. }
            | Self::InvalidMethod(_) => StatusCode::BAD_REQUEST,
            Self::ConnectionNotFound(_) => StatusCode::NOT_FOUND,
            Self::ConnectionClosed(_) => StatusCode::GONE,
            Self::Encode(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

/// Wire-level error taxonomy.
///
/// The `Display` text of each variant is exactly the `message` field the
/// client receives.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The frame is not a decodable JSON message.
    #[error("Cannot parse message")]
    Undecodable,

    /// The message carries no correlation `id`.
    #[error("Message missing id")]
    MissingId,

    /// The `type` field is absent or not one of the recognized values.
    #[error("Unknown message type")]
    UnknownType,

    /// A `request` frame without `method`.
    #[error("Message missing method")]
    MissingMethod,

    /// A `request` frame without `path`.
    #[error("Message missing path")]
    MissingPath,

    /// The `method` field is not a valid HTTP method token.
    #[error("Invalid method")]
    InvalidMethod,

    /// A `request` or `message` arrived before the handshake completed.
    #[error("Connection is not initialized")]
    NotInitialized,

    /// A second `hello` arrived on a ready connection.
    #[error("Connection already initialized")]
    AlreadyInitialized,

    /// No route matches the identifier or method and path.
    #[error("Not Found")]
    RouteNotFound,

    /// The identifier names a route registered with the wildcard method.
    #[error("Cannot use route id with wildcard method route config")]
    WildcardRouteId,

    /// No custom message handler is configured.
    #[error("Custom messages are not supported")]
    CustomMessagesUnsupported,

    /// A route handler, message handler or authenticator reported failure.
    #[error("{message}")]
    Application {
        /// Status reported to the client.
        status: StatusCode,
        /// Message text of the handler error.
        message: String,
    },
}

impl ProtocolError {
    /// Returns the status code carried on the wire for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Undecodable
            | Self::MissingId
            | Self::UnknownType
            | Self::MissingMethod
            | Self::MissingPath
            | Self::InvalidMethod
            | Self::NotInitialized
            | Self::AlreadyInitialized
            | Self::WildcardRouteId => StatusCode::BAD_REQUEST,
            Self::RouteNotFound => StatusCode::NOT_FOUND,
            Self::CustomMessagesUnsupported => StatusCode::NOT_IMPLEMENTED,
            Self::Application { status, .. } => *status,
        }
    }

    /// Builds the `{statusCode, error, message}` payload for this error.
    #[must_use]
    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload::new(self.status_code(), self.to_string())
    }
}

impl From<HandlerError> for ProtocolError {
    fn from(err: HandlerError) -> Self {
        Self::Application {
            status: err.status(),
            message: err.message().to_string(),
        }
    }
}

/// The `payload` of every error envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    /// Numeric HTTP status.
    pub status_code: u16,
    /// Canonical reason phrase of the status.
    pub error: String,
    /// Human-readable message.
    pub message: String,
}

impl ErrorPayload {
    /// Creates a payload for `status` with the given message text.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Unknown").to_string(),
            message: message.into(),
        }
    }
}
