//! WebSocket wire types: inbound frames, outbound envelopes and replies.

use axum::http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::handler::{Headers, RouteResponse};
use crate::domain::ConnectionId;
use crate::error::{ErrorPayload, ProtocolError};

/// Client-chosen correlation token.
///
/// Any non-null JSON value is accepted and echoed back verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Value);

impl MessageId {
    /// Wraps a JSON value. Returns `None` for `null`.
    #[must_use]
    pub fn new(value: Value) -> Option<Self> {
        if value.is_null() {
            None
        } else {
            Some(Self(value))
        }
    }

    /// Returns the raw JSON value.
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<u64> for MessageId {
    fn from(id: u64) -> Self {
        Self(Value::from(id))
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self(Value::from(id))
    }
}

/// Recognized inbound message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Handshake.
    Hello,
    /// Route request.
    Request,
    /// Custom application message.
    Message,
}

impl MessageKind {
    /// Parses a `type` field value.
    #[must_use]
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "hello" => Some(Self::Hello),
            "request" => Some(Self::Request),
            "message" => Some(Self::Message),
            _ => None,
        }
    }
}

/// A decoded frame before validation.
///
/// Every field is kept as raw JSON here; the session validates them in
/// order so that each missing or mistyped field yields its own error and
/// the reply still echoes the `id`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundFrame {
    /// Correlation token.
    pub id: Option<Value>,
    /// Message type.
    #[serde(rename = "type")]
    pub kind: Option<Value>,
    /// Request method.
    pub method: Option<Value>,
    /// Request path, or a route identifier when it does not start with `/`.
    pub path: Option<Value>,
    /// Request headers.
    pub headers: Option<Value>,
    /// Request body.
    pub payload: Option<Value>,
    /// Custom message body.
    pub message: Option<Value>,
    /// Handshake credentials.
    pub auth: Option<Value>,
}

impl InboundFrame {
    /// Returns the correlation token, treating `null` as absent.
    #[must_use]
    pub fn message_id(&self) -> Option<MessageId> {
        self.id.clone().and_then(MessageId::new)
    }

    /// Returns the recognized message type. A `type` that is not one of
    /// the known strings yields `None`.
    #[must_use]
    pub fn message_kind(&self) -> Option<MessageKind> {
        self.kind
            .as_ref()
            .and_then(Value::as_str)
            .and_then(MessageKind::parse)
    }

    /// Validates a `request` frame into a [`RequestMessage`].
    ///
    /// A `method` or `path` that is not a string counts as missing.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::MissingMethod`] if `method` is absent.
    /// - [`ProtocolError::MissingPath`] if `path` is absent.
    /// - [`ProtocolError::InvalidMethod`] if `method` is not a method token.
    pub fn into_request(self, id: MessageId) -> Result<RequestMessage, ProtocolError> {
        let method = string_field(self.method).ok_or(ProtocolError::MissingMethod)?;
        let path = string_field(self.path).ok_or(ProtocolError::MissingPath)?;
        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .map_err(|_| ProtocolError::InvalidMethod)?;
        Ok(RequestMessage {
            id,
            method,
            target: RequestTarget::parse(path),
            headers: header_map(self.headers),
            payload: self.payload,
        })
    }
}

fn string_field(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

/// Converts a `headers` object into a [`Headers`] map.
///
/// Scalar values are stringified; `null`, arrays and objects are dropped.
/// Anything other than an object yields an empty map.
fn header_map(value: Option<Value>) -> Headers {
    let Some(Value::Object(map)) = value else {
        return Headers::new();
    };
    map.into_iter()
        .filter_map(|(name, value)| match value {
            Value::String(s) => Some((name, s)),
            Value::Number(n) => Some((name, n.to_string())),
            Value::Bool(b) => Some((name, b.to_string())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        })
        .collect()
}

/// How a request addresses its route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestTarget {
    /// Literal path (starts with `/`).
    Path(String),
    /// Route identifier.
    RouteId(String),
}

impl RequestTarget {
    /// Classifies the `path` field of a request.
    #[must_use]
    pub fn parse(path: String) -> Self {
        if path.starts_with('/') {
            Self::Path(path)
        } else {
            Self::RouteId(path)
        }
    }
}

/// A validated `request` message.
#[derive(Debug, Clone)]
pub struct RequestMessage {
    /// Correlation token.
    pub id: MessageId,
    /// Requested method.
    pub method: Method,
    /// Path or route identifier.
    pub target: RequestTarget,
    /// Request headers.
    pub headers: Headers,
    /// Request body.
    pub payload: Option<Value>,
}

/// Discriminator for outbound envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeType {
    /// Handshake acknowledgement.
    Hello,
    /// Reply to a request, and every error reply.
    Response,
    /// Reply to a custom message, or a server push.
    Message,
}

impl EnvelopeType {
    /// Wire name of the type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hello => "hello",
            Self::Response => "response",
            Self::Message => "message",
        }
    }
}

/// Uniform outbound envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundEnvelope<P = Value> {
    /// Echo of the inbound correlation token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    /// Envelope type.
    #[serde(rename = "type")]
    pub kind: EnvelopeType,
    /// Numeric HTTP status.
    pub status_code: u16,
    /// Body.
    pub payload: P,
    /// Response headers.
    #[serde(skip_serializing_if = "Headers::is_empty")]
    pub headers: Headers,
}

impl OutboundEnvelope {
    /// Wraps a route result.
    #[must_use]
    pub fn response(id: MessageId, response: RouteResponse) -> Self {
        Self {
            id: Some(id),
            kind: EnvelopeType::Response,
            status_code: response.status.as_u16(),
            payload: response.payload,
            headers: response.headers,
        }
    }

    /// Wraps a custom message handler result.
    #[must_use]
    pub fn message(id: MessageId, payload: Value) -> Self {
        Self {
            id: Some(id),
            kind: EnvelopeType::Message,
            status_code: 200,
            payload,
            headers: Headers::new(),
        }
    }

    /// Acknowledges a completed handshake.
    #[must_use]
    pub fn hello(id: Option<MessageId>, connection_id: ConnectionId) -> Self {
        Self {
            id,
            kind: EnvelopeType::Hello,
            status_code: 200,
            payload: serde_json::json!({ "socket": connection_id }),
            headers: Headers::new(),
        }
    }
}

impl<P> OutboundEnvelope<P> {
    /// Unsolicited server push. Carries no correlation token.
    #[must_use]
    pub fn push(payload: P) -> Self {
        Self {
            id: None,
            kind: EnvelopeType::Message,
            status_code: 200,
            payload,
            headers: Headers::new(),
        }
    }
}

impl OutboundEnvelope<ErrorPayload> {
    /// Error reply. Always `type: "response"`.
    #[must_use]
    pub fn error(id: Option<MessageId>, error: &ProtocolError) -> Self {
        let payload = error.payload();
        Self {
            id,
            kind: EnvelopeType::Response,
            status_code: payload.status_code,
            payload,
            headers: Headers::new(),
        }
    }
}

/// Handshake-stage rejection, sent without the envelope wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BareError {
    /// Echo of the inbound correlation token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    /// Error text.
    pub error: String,
}

/// Everything the session can send in reply to one frame.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Reply {
    /// Successful envelope.
    Envelope(OutboundEnvelope),
    /// Error envelope.
    Failure(OutboundEnvelope<ErrorPayload>),
    /// Handshake-stage rejection.
    Bare(BareError),
}

impl Reply {
    /// Error envelope for `error`.
    #[must_use]
    pub fn failure(id: Option<MessageId>, error: &ProtocolError) -> Self {
        Self::Failure(OutboundEnvelope::error(id, error))
    }

    /// Rejection for a frame that arrived before the handshake.
    #[must_use]
    pub fn not_initialized(id: Option<MessageId>) -> Self {
        Self::Bare(BareError {
            id,
            error: ProtocolError::NotInitialized.to_string(),
        })
    }

    /// Correlation token carried by the reply.
    #[must_use]
    pub const fn id(&self) -> Option<&MessageId> {
        match self {
            Self::Envelope(env) => env.id.as_ref(),
            Self::Failure(env) => env.id.as_ref(),
            Self::Bare(bare) => bare.id.as_ref(),
        }
    }

    /// Classification token used when reporting encoding failures.
    #[must_use]
    pub const fn envelope_type(&self) -> &'static str {
        match self {
            Self::Envelope(env) => env.kind.as_str(),
            Self::Failure(env) => env.kind.as_str(),
            Self::Bare(_) => "error",
        }
    }

    /// Status code of the reply, if it carries one.
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Envelope(env) => Some(env.status_code),
            Self::Failure(env) => Some(env.status_code),
            Self::Bare(_) => None,
        }
    }
}
