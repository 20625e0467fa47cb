//! Per-connection protocol state machine.
//!
//! ```text
//! Connecting ──open()──▶ AwaitingHandshake ──hello──▶ Ready
//!      │                        │                       │
//!      └────────────────────────┴───────close()─────────┴──▶ Closed
//! ```
//!
//! Frames are processed one at a time. Each frame goes through decode,
//! handshake, `id`, readiness, `type` and field checks in that order, and
//! produces at most one reply.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::codec;
use super::messages::{InboundFrame, MessageKind, OutboundEnvelope, Reply};
use crate::domain::handler::{Authenticator, SocketContext};
use crate::domain::{ConnectionHandle, ConnectionId, EventBus};
use crate::error::ProtocolError;
use crate::gateway::Gateway;
use crate::service::{MessageDispatcher, RouteResolver};

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport accepted, nothing processed yet.
    Connecting,
    /// Transport open, waiting for `hello`.
    AwaitingHandshake,
    /// Handshake complete; requests and messages are accepted.
    Ready,
    /// Transport closed. Terminal.
    Closed,
}

/// Protocol session for one connection.
pub struct SocketSession {
    handle: ConnectionHandle,
    state: SessionState,
    credentials: Option<Value>,
    resolver: RouteResolver,
    dispatcher: MessageDispatcher,
    authenticator: Option<Arc<dyn Authenticator>>,
    events: EventBus,
}

impl SocketSession {
    /// Creates a session in the `Connecting` state.
    #[must_use]
    pub fn new(gateway: &Gateway, handle: ConnectionHandle) -> Self {
        Self {
            handle,
            state: SessionState::Connecting,
            credentials: None,
            resolver: gateway.resolver().clone(),
            dispatcher: gateway.dispatcher().clone(),
            authenticator: gateway.authenticator().cloned(),
            events: gateway.events().clone(),
        }
    }

    /// Connection identifier.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.handle.id()
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Credentials established by the handshake.
    #[must_use]
    pub const fn credentials(&self) -> Option<&Value> {
        self.credentials.as_ref()
    }

    /// Handles the transport-open notification.
    pub fn open(&mut self) {
        if self.state == SessionState::Connecting {
            self.state = SessionState::AwaitingHandshake;
            tracing::debug!(connection_id = %self.id(), "awaiting handshake");
        } else {
            tracing::warn!(
                connection_id = %self.id(),
                state = ?self.state,
                "open on non-connecting session"
            );
        }
    }

    /// Handles the transport-close notification.
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            self.handle.mark_closed();
            self.state = SessionState::Closed;
            tracing::debug!(connection_id = %self.id(), "session closed");
        }
    }

    /// Processes one text frame and returns the encoded reply, if any.
    ///
    /// Returns `None` when the session is closed, when the transport closed
    /// while the frame was in flight, or when the reply could not be
    /// encoded (reported as an operational event).
    pub async fn handle_frame(&mut self, text: &str) -> Option<String> {
        if self.state == SessionState::Closed {
            return None;
        }
        let reply = self.process(text).await;
        if self.handle.is_closed() {
            tracing::debug!(
                connection_id = %self.id(),
                id = ?reply.id(),
                "transport closed while processing; reply discarded"
            );
            self.state = SessionState::Closed;
            return None;
        }
        self.encode(&reply, reply.envelope_type())
    }

    /// Processes one text frame into a reply without encoding it.
    pub async fn process(&mut self, text: &str) -> Reply {
        let frame = match codec::decode(text) {
            Ok(frame) => frame,
            Err(e) => return Reply::failure(None, &e),
        };

        if frame.message_kind() == Some(MessageKind::Hello) {
            return self.handshake(frame).await;
        }

        let Some(id) = frame.message_id() else {
            return Reply::failure(None, &ProtocolError::MissingId);
        };

        if self.state != SessionState::Ready {
            tracing::debug!(
                connection_id = %self.id(),
                state = ?self.state,
                "frame before handshake"
            );
            return Reply::not_initialized(Some(id));
        }

        let result = match frame.message_kind() {
            Some(MessageKind::Request) => match frame.into_request(id.clone()) {
                Ok(request) => self.resolver.dispatch(request, &self.context()).await,
                Err(e) => Err(e),
            },
            Some(MessageKind::Message) => {
                let message = frame.message.unwrap_or(Value::Null);
                self.dispatcher
                    .dispatch(id.clone(), self.context(), message)
                    .await
            }
            Some(MessageKind::Hello) | None => Err(ProtocolError::UnknownType),
        };

        match result {
            Ok(envelope) => Reply::Envelope(envelope),
            Err(e) => Reply::failure(Some(id), &e),
        }
    }

    /// Encodes an outbound value for this connection.
    ///
    /// Failures are logged and published as
    /// [`crate::domain::GatewayEvent::SerializationFailed`] with
    /// `envelope_type` as the classification token; the session stays
    /// usable.
    pub fn encode<T: Serialize + ?Sized>(
        &self,
        value: &T,
        envelope_type: &str,
    ) -> Option<String> {
        codec::encode_reported(value, envelope_type, self.id(), &self.events).ok()
    }

    async fn handshake(&mut self, frame: InboundFrame) -> Reply {
        let id = frame.message_id();
        match self.state {
            SessionState::AwaitingHandshake => {}
            SessionState::Ready => return Reply::failure(id, &ProtocolError::AlreadyInitialized),
            SessionState::Connecting | SessionState::Closed => {
                return Reply::not_initialized(id);
            }
        }

        let credentials = match &self.authenticator {
            Some(authenticator) => {
                match authenticator.authenticate(self.id(), frame.auth).await {
                    Ok(credentials) => credentials,
                    Err(e) => {
                        tracing::info!(
                            connection_id = %self.id(),
                            error = %e,
                            "handshake rejected"
                        );
                        return Reply::failure(id, &e.into());
                    }
                }
            }
            None => frame.auth,
        };

        self.credentials = credentials;
        self.state = SessionState::Ready;
        tracing::info!(connection_id = %self.id(), "handshake complete");
        Reply::Envelope(OutboundEnvelope::hello(id, self.id()))
    }

    fn context(&self) -> SocketContext {
        SocketContext {
            connection_id: self.id(),
            credentials: self.credentials.clone(),
        }
    }
}

impl std::fmt::Debug for SocketSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketSession")
            .field("connection_id", &self.id())
            .field("state", &self.state)
            .field("authenticated", &self.credentials.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;
    use crate::domain::handler::{HandlerError, RouteRequest, RouteResponse};
    use crate::domain::{GatewayEvent, Route, RouteTable};
    use crate::ws::codec::tests::Node;

    async fn hello(_req: RouteRequest) -> Result<RouteResponse, HandlerError> {
        Ok(RouteResponse::text("hello"))
    }

    fn routes() -> RouteTable {
        let mut table = RouteTable::new();
        for route in [
            Route::get("/", hello).with_id("resource"),
            Route::any("/wild", hello).with_id("wild"),
        ] {
            if let Err(e) = table.register(route) {
                panic!("registration failed: {e}");
            }
        }
        table
    }

    struct Harness {
        session: SocketSession,
        _outbound: mpsc::Receiver<String>,
    }

    fn open_session(gateway: &Gateway) -> Harness {
        let (tx, rx) = mpsc::channel(8);
        let mut session = gateway.session(gateway.connection_handle(tx));
        session.open();
        Harness {
            session,
            _outbound: rx,
        }
    }

    async fn send(session: &mut SocketSession, frame: Value) -> Value {
        let Some(text) = session.handle_frame(&frame.to_string()).await else {
            panic!("expected a reply to {frame}");
        };
        let Ok(value) = serde_json::from_str(&text) else {
            panic!("reply is not JSON: {text}");
        };
        value
    }

    async fn ready(gateway: &Gateway) -> Harness {
        let mut h = open_session(gateway);
        let reply = send(&mut h.session, json!({"id": 1, "type": "hello"})).await;
        assert_eq!(reply["type"], "hello");
        assert_eq!(h.session.state(), SessionState::Ready);
        h
    }

    fn bad_request(message: &str) -> Value {
        json!({"statusCode": 400, "error": "Bad Request", "message": message})
    }

    #[tokio::test]
    async fn lifecycle_transitions() {
        let gateway = Gateway::builder().build();
        let (tx, _rx) = mpsc::channel(1);
        let mut session = gateway.session(gateway.connection_handle(tx));
        assert_eq!(session.state(), SessionState::Connecting);
        session.open();
        assert_eq!(session.state(), SessionState::AwaitingHandshake);
        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.handle_frame(r#"{"id":1,"type":"hello"}"#).await.is_none());
    }

    #[tokio::test]
    async fn hello_reply_echoes_id_and_names_socket() {
        let gateway = Gateway::builder().build();
        let mut h = open_session(&gateway);
        let reply = send(&mut h.session, json!({"id": "h1", "type": "hello"})).await;
        assert_eq!(reply["id"], "h1");
        assert_eq!(reply["statusCode"], 200);
        assert_eq!(reply["payload"]["socket"], h.session.id().to_string());
    }

    #[tokio::test]
    async fn hello_without_id_is_accepted() {
        let gateway = Gateway::builder().build();
        let mut h = open_session(&gateway);
        let reply = send(&mut h.session, json!({"type": "hello"})).await;
        assert!(reply.get("id").is_none());
        assert_eq!(h.session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn second_hello_is_rejected() {
        let gateway = Gateway::builder().build();
        let mut h = ready(&gateway).await;
        let reply = send(&mut h.session, json!({"id": 9, "type": "hello"})).await;
        assert_eq!(reply["payload"], bad_request("Connection already initialized"));
        assert_eq!(h.session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn malformed_frame_gets_generic_bad_request() {
        let gateway = Gateway::builder().routes(routes()).build();
        let mut h = open_session(&gateway);
        for garbage in ["{", "not json", "[]", "\"hello\""] {
            let Some(text) = h.session.handle_frame(garbage).await else {
                panic!("expected reply for {garbage}");
            };
            let Ok(reply) = serde_json::from_str::<Value>(&text) else {
                panic!("reply is not JSON");
            };
            assert_eq!(reply["statusCode"], 400);
            assert_eq!(reply["payload"], bad_request("Cannot parse message"));
            assert!(reply.get("id").is_none());
        }
    }

    #[tokio::test]
    async fn missing_id_is_checked_before_handshake() {
        let gateway = Gateway::builder().routes(routes()).build();
        let mut h = open_session(&gateway);
        let reply = send(
            &mut h.session,
            json!({"type": "request", "method": "GET", "path": "/"}),
        )
        .await;
        assert_eq!(reply["type"], "response");
        assert_eq!(reply["statusCode"], 400);
        assert_eq!(reply["payload"], bad_request("Message missing id"));
    }

    #[tokio::test]
    async fn nothing_is_processed_before_hello() {
        let gateway = Gateway::builder()
            .routes(routes())
            .on_message(|_s: SocketContext, _m: Value| async move {
                Err::<Value, _>(HandlerError::new("handler ran before hello"))
            })
            .build();
        let mut h = open_session(&gateway);

        for frame in [
            json!({"id": 1, "type": "request", "path": "/"}),
            json!({"id": 2, "type": "request", "method": "GET", "path": "/"}),
            json!({"id": 3, "type": "message", "message": "winning"}),
            json!({"id": 4, "type": "unknown"}),
        ] {
            let id = frame["id"].clone();
            let reply = send(&mut h.session, frame).await;
            assert_eq!(reply, json!({"id": id, "error": "Connection is not initialized"}));
        }
        assert_eq!(h.session.state(), SessionState::AwaitingHandshake);
    }

    #[tokio::test]
    async fn field_validation_after_handshake() {
        let gateway = Gateway::builder().routes(routes()).build();
        let mut h = ready(&gateway).await;

        let cases = [
            (json!({"id": 2, "type": "request", "path": "/"}), "Message missing method"),
            (json!({"id": 2, "type": "request", "method": "GET"}), "Message missing path"),
            (json!({"id": 2, "type": "unknown"}), "Unknown message type"),
            (json!({"id": 2}), "Unknown message type"),
        ];
        for (frame, message) in cases {
            let reply = send(&mut h.session, frame).await;
            assert_eq!(reply["id"], 2);
            assert_eq!(reply["type"], "response");
            assert_eq!(reply["statusCode"], 400);
            assert_eq!(reply["payload"], bad_request(message));
        }
    }

    #[tokio::test]
    async fn mistyped_fields_keep_the_id() {
        let gateway = Gateway::builder().routes(routes()).build();
        let mut h = ready(&gateway).await;

        let cases = [
            (json!({"id": 2, "type": 5}), "Unknown message type"),
            (
                json!({"id": 3, "type": "request", "method": 7, "path": "/"}),
                "Message missing method",
            ),
            (
                json!({"id": 4, "type": "request", "method": "GET", "path": 1}),
                "Message missing path",
            ),
        ];
        for (frame, message) in cases {
            let id = frame["id"].clone();
            let reply = send(&mut h.session, frame).await;
            assert_eq!(reply["id"], id);
            assert_eq!(reply["statusCode"], 400);
            assert_eq!(reply["payload"], bad_request(message));
        }
    }

    #[tokio::test]
    async fn non_string_header_values_reach_the_route() {
        let mut table = RouteTable::new();
        let route = Route::get("/headers", |req: RouteRequest| async move {
            Ok::<_, HandlerError>(RouteResponse::new(json!(req.headers)))
        });
        if let Err(e) = table.register(route) {
            panic!("registration failed: {e}");
        }
        let gateway = Gateway::builder().routes(table).build();
        let mut h = ready(&gateway).await;

        let reply = send(
            &mut h.session,
            json!({
                "id": 3,
                "type": "request",
                "method": "GET",
                "path": "/headers",
                "headers": {"x-n": 1, "x-name": "a"}
            }),
        )
        .await;
        assert_eq!(reply["id"], 3);
        assert_eq!(reply["statusCode"], 200);
        assert_eq!(reply["payload"], json!({"x-n": "1", "x-name": "a"}));
    }

    #[tokio::test]
    async fn invalid_method_token_is_bad_request() {
        let gateway = Gateway::builder().routes(routes()).build();
        let mut h = ready(&gateway).await;

        let reply = send(
            &mut h.session,
            json!({"id": 5, "type": "request", "method": "GE T", "path": "/"}),
        )
        .await;
        assert_eq!(reply["id"], 5);
        assert_eq!(reply["type"], "response");
        assert_eq!(reply["payload"], bad_request("Invalid method"));
    }

    #[tokio::test]
    async fn request_by_path_and_by_id() {
        let gateway = Gateway::builder().routes(routes()).build();
        let mut h = ready(&gateway).await;

        let reply = send(
            &mut h.session,
            json!({"id": 2, "type": "request", "method": "GET", "path": "/"}),
        )
        .await;
        assert_eq!(reply["id"], 2);
        assert_eq!(reply["statusCode"], 200);
        assert_eq!(reply["payload"], "hello");

        let reply = send(
            &mut h.session,
            json!({"id": 3, "type": "request", "method": "GET", "path": "resource"}),
        )
        .await;
        assert_eq!(reply["statusCode"], 200);
        assert_eq!(reply["headers"]["content-type"], "text/html; charset=utf-8");

        let reply = send(
            &mut h.session,
            json!({"id": 4, "type": "request", "method": "GET", "path": "something"}),
        )
        .await;
        assert_eq!(reply["id"], 4);
        assert_eq!(reply["statusCode"], 404);

        let reply = send(
            &mut h.session,
            json!({"id": 5, "type": "request", "method": "GET", "path": "wild"}),
        )
        .await;
        assert_eq!(reply["statusCode"], 400);
    }

    #[tokio::test]
    async fn custom_message_without_handler() {
        let gateway = Gateway::builder().build();
        let mut h = ready(&gateway).await;
        let reply = send(
            &mut h.session,
            json!({"id": 2, "type": "message", "message": "winning"}),
        )
        .await;
        assert_eq!(reply["id"], 2);
        assert_eq!(reply["payload"]["message"], "Custom messages are not supported");
    }

    #[tokio::test]
    async fn custom_message_handler_success_and_failure() {
        let gateway = Gateway::builder()
            .on_message(|_s: SocketContext, m: Value| async move {
                if m == json!("winning") {
                    Ok(json!("hello"))
                } else {
                    Err(HandlerError::new("failed"))
                }
            })
            .build();
        let mut h = ready(&gateway).await;

        let reply = send(
            &mut h.session,
            json!({"id": 2, "type": "message", "message": "winning"}),
        )
        .await;
        assert_eq!(
            reply,
            json!({"id": 2, "type": "message", "statusCode": 200, "payload": "hello"})
        );

        let reply = send(
            &mut h.session,
            json!({"id": 3, "type": "message", "message": "losing"}),
        )
        .await;
        assert_eq!(reply["id"], 3);
        assert_eq!(reply["payload"]["message"], "failed");
        assert_eq!(reply["statusCode"], 500);
    }

    #[tokio::test]
    async fn authenticator_gates_handshake() {
        let gateway = Gateway::builder()
            .authenticator(|_id: ConnectionId, auth: Option<Value>| async move {
                match auth {
                    Some(token) if token == json!("secret") => Ok(Some(json!({"user": "john"}))),
                    _ => Err(HandlerError::unauthorized("Missing authentication")),
                }
            })
            .build();
        let mut h = open_session(&gateway);

        let frame = json!({"id": 1, "type": "hello", "auth": "wrong"});
        let reply = send(&mut h.session, frame).await;
        assert_eq!(reply["statusCode"], 401);
        assert_eq!(reply["payload"]["message"], "Missing authentication");
        assert_eq!(h.session.state(), SessionState::AwaitingHandshake);

        let frame = json!({"id": 2, "type": "hello", "auth": "secret"});
        let reply = send(&mut h.session, frame).await;
        assert_eq!(reply["statusCode"], 200);
        assert_eq!(h.session.credentials(), Some(&json!({"user": "john"})));
    }

    #[tokio::test]
    async fn unencodable_envelope_is_reported_and_session_survives() {
        let gateway = Gateway::builder().routes(routes()).build();
        let mut events = gateway.events().subscribe();
        let mut h = ready(&gateway).await;

        let node = Node::cycle();
        let envelope = OutboundEnvelope::push(node.as_ref());
        assert!(h.session.encode(&envelope, "other").is_none());

        let Ok(GatewayEvent::SerializationFailed { envelope_type, .. }) = events.recv().await
        else {
            panic!("expected SerializationFailed");
        };
        assert_eq!(envelope_type, "other");

        let reply = send(
            &mut h.session,
            json!({"id": 2, "type": "request", "method": "GET", "path": "/"}),
        )
        .await;
        assert_eq!(reply["statusCode"], 200);
        assert_eq!(h.session.state(), SessionState::Ready);

        let _ = node.c.borrow_mut().take();
    }

    #[tokio::test]
    async fn reply_discarded_when_transport_closes_in_flight() {
        let (closer_tx, closer_rx) = mpsc::channel::<ConnectionHandle>(1);
        let closer_rx = Arc::new(tokio::sync::Mutex::new(closer_rx));
        let mut table = RouteTable::new();
        let route = Route::get("/slow", move |_req: RouteRequest| {
            let closer_rx = Arc::clone(&closer_rx);
            async move {
                if let Some(handle) = closer_rx.lock().await.recv().await {
                    handle.mark_closed();
                }
                Ok::<_, HandlerError>(RouteResponse::text("late"))
            }
        });
        if let Err(e) = table.register(route) {
            panic!("registration failed: {e}");
        }
        let gateway = Gateway::builder().routes(table).build();
        let (tx, _rx) = mpsc::channel(8);
        let handle = gateway.connection_handle(tx);
        let mut session = gateway.session(handle.clone());
        session.open();
        let _ = session.handle_frame(r#"{"id":1,"type":"hello"}"#).await;

        let _ = closer_tx.send(handle).await;
        let reply = session
            .handle_frame(r#"{"id":2,"type":"request","method":"GET","path":"/slow"}"#)
            .await;
        assert!(reply.is_none());
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn application_errors_keep_custom_status() {
        let mut table = RouteTable::new();
        let route = Route::get("/teapot", |_req: RouteRequest| async move {
            Err::<RouteResponse, _>(HandlerError::with_status(
                StatusCode::IM_A_TEAPOT,
                "short and stout",
            ))
        });
        if let Err(e) = table.register(route) {
            panic!("registration failed: {e}");
        }
        let gateway = Gateway::builder().routes(table).build();
        let mut h = ready(&gateway).await;
        let reply = send(
            &mut h.session,
            json!({"id": 2, "type": "request", "method": "GET", "path": "/teapot"}),
        )
        .await;
        assert_eq!(reply["statusCode"], 418);
        assert_eq!(reply["payload"]["message"], "short and stout");
    }
}
