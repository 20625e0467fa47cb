//! Custom message dispatch through the single configured handler.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::domain::handler::{MessageHandler, SocketContext};
use crate::error::ProtocolError;
use crate::ws::messages::{MessageId, OutboundEnvelope};

/// Forwards `message` frames to the gateway's custom message handler.
#[derive(Clone, Default)]
pub struct MessageDispatcher {
    handler: Option<Arc<dyn MessageHandler>>,
}

impl MessageDispatcher {
    /// Creates a dispatcher. `None` rejects every custom message.
    #[must_use]
    pub fn new(handler: Option<Arc<dyn MessageHandler>>) -> Self {
        Self { handler }
    }

    /// Returns `true` if a handler is configured.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.handler.is_some()
    }

    /// Runs the handler and wraps its value in a `message` envelope.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::CustomMessagesUnsupported`] if no handler is set.
    /// - [`ProtocolError::Application`] carrying the handler's error text.
    pub async fn dispatch(
        &self,
        id: MessageId,
        socket: SocketContext,
        message: Value,
    ) -> Result<OutboundEnvelope, ProtocolError> {
        let Some(handler) = &self.handler else {
            return Err(ProtocolError::CustomMessagesUnsupported);
        };
        let connection_id = socket.connection_id;
        match handler.on_message(socket, message).await {
            Ok(payload) => Ok(OutboundEnvelope::message(id, payload)),
            Err(e) => {
                tracing::debug!(%connection_id, error = %e, "custom message handler failed");
                Err(e.into())
            }
        }
    }
}

impl fmt::Debug for MessageDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageDispatcher")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::domain::ConnectionId;
    use crate::domain::handler::HandlerError;
    use crate::ws::messages::EnvelopeType;

    fn socket() -> SocketContext {
        SocketContext {
            connection_id: ConnectionId::new(),
            credentials: None,
        }
    }

    fn dispatcher(handler: impl MessageHandler) -> MessageDispatcher {
        MessageDispatcher::new(Some(Arc::new(handler)))
    }

    #[tokio::test]
    async fn without_handler_always_unsupported() {
        let dispatcher = MessageDispatcher::default();
        assert!(!dispatcher.is_enabled());
        for message in [json!("winning"), json!({"x": 1}), Value::Null] {
            let err = assert_err!(dispatcher.dispatch(MessageId::from(1), socket(), message).await);
            assert_eq!(err, ProtocolError::CustomMessagesUnsupported);
            assert_eq!(err.payload().message, "Custom messages are not supported");
        }
    }

    #[tokio::test]
    async fn success_becomes_message_envelope() {
        let dispatcher = dispatcher(|_socket: SocketContext, message: Value| async move {
            assert_eq!(message, json!("winning"));
            Ok::<_, HandlerError>(json!("hello"))
        });
        let env = assert_ok!(
            dispatcher
                .dispatch(MessageId::from(5), socket(), json!("winning"))
                .await
        );
        assert_eq!(env.id, Some(MessageId::from(5)));
        assert_eq!(env.kind, EnvelopeType::Message);
        assert_eq!(env.payload, json!("hello"));
    }

    #[tokio::test]
    async fn handler_sees_connection_identity() {
        let ctx = socket();
        let expected = ctx.connection_id;
        let dispatcher = dispatcher(move |socket: SocketContext, _message: Value| async move {
            Ok::<_, HandlerError>(json!(socket.connection_id == expected))
        });
        let env = assert_ok!(dispatcher.dispatch(MessageId::from(1), ctx, Value::Null).await);
        assert_eq!(env.payload, json!(true));
    }

    #[tokio::test]
    async fn error_surfaces_message_text_only() {
        let dispatcher = dispatcher(|_socket: SocketContext, _message: Value| async move {
            Err::<Value, _>(HandlerError::new("failed"))
        });
        let err = assert_err!(
            dispatcher
                .dispatch(MessageId::from(1), socket(), json!("winning"))
                .await
        );
        let payload = err.payload();
        assert_eq!(payload.message, "failed");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
