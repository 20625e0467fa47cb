//! Envelope codec: text frames in, structured messages out, and back.
//!
//! Decoding failures become [`ProtocolError::Undecodable`]. Encoding
//! failures never reach the wire: they are logged, published as a
//! [`GatewayEvent::SerializationFailed`] event, and the frame is dropped.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use super::messages::InboundFrame;
use crate::domain::{ConnectionId, EventBus, GatewayEvent};
use crate::error::ProtocolError;

/// Decodes one text frame.
///
/// The frame must be a JSON object. Field types are not checked here, so
/// a mistyped field still leaves the `id` available for the reply.
///
/// # Errors
///
/// Returns [`ProtocolError::Undecodable`] if the text is not JSON or not
/// an object.
pub fn decode(text: &str) -> Result<InboundFrame, ProtocolError> {
    let value: Value = serde_json::from_str(text).map_err(|e| {
        tracing::debug!(error = %e, "inbound frame is not valid JSON");
        ProtocolError::Undecodable
    })?;
    if !value.is_object() {
        tracing::debug!("inbound frame is not a JSON object");
        return Err(ProtocolError::Undecodable);
    }
    serde_json::from_value(value).map_err(|e| {
        tracing::debug!(error = %e, "inbound frame has malformed fields");
        ProtocolError::Undecodable
    })
}

/// Encodes an outbound value to a text frame.
///
/// # Errors
///
/// Returns the serializer error if `value` cannot be represented as JSON.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(value)
}

/// Encodes an outbound value, reporting failures as an operational event.
///
/// `envelope_type` is the classification token attached to the event.
///
/// # Errors
///
/// Returns the serializer error after it has been reported.
pub fn encode_reported<T: Serialize + ?Sized>(
    value: &T,
    envelope_type: &str,
    connection_id: ConnectionId,
    events: &EventBus,
) -> Result<String, serde_json::Error> {
    encode(value).map_err(|e| {
        tracing::error!(
            connection_id = %connection_id,
            envelope_type,
            error = %e,
            "failed to serialize outbound envelope"
        );
        let _ = events.publish(GatewayEvent::SerializationFailed {
            connection_id,
            envelope_type: envelope_type.to_string(),
            reason: e.to_string(),
            timestamp: Utc::now(),
        });
        e
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
pub(crate) mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use serde::ser::{Error as _, SerializeMap, Serializer};

    use super::*;
    use crate::ws::messages::OutboundEnvelope;

    /// Graph node that can point back at itself. Serializing a cycle
    /// fails instead of recursing forever.
    #[derive(Debug, Default)]
    pub(crate) struct Node {
        pub(crate) b: u32,
        pub(crate) c: RefCell<Option<Rc<Node>>>,
    }

    impl Node {
        /// Builds `a = { b: 1 }; a.c = a`.
        pub(crate) fn cycle() -> Rc<Self> {
            let node = Rc::new(Self {
                b: 1,
                c: RefCell::new(None),
            });
            *node.c.borrow_mut() = Some(Rc::clone(&node));
            node
        }
    }

    thread_local! {
        static VISITING: RefCell<Vec<*const Node>> = const { RefCell::new(Vec::new()) };
    }

    impl Serialize for Node {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let ptr: *const Node = self;
            let seen = VISITING.with(|v| v.borrow().contains(&ptr));
            if seen {
                VISITING.with(|v| v.borrow_mut().clear());
                return Err(S::Error::custom("circular reference"));
            }
            VISITING.with(|v| v.borrow_mut().push(ptr));
            let mut map = serializer.serialize_map(None)?;
            map.serialize_entry("b", &self.b)?;
            if let Some(next) = self.c.borrow().as_ref() {
                map.serialize_entry("c", next.as_ref())?;
            }
            let _ = VISITING.with(|v| v.borrow_mut().pop());
            map.end()
        }
    }

    #[test]
    fn decode_rejects_garbage() {
        assert_eq!(decode("{").err(), Some(ProtocolError::Undecodable));
        assert_eq!(decode("[1, 2]").err(), Some(ProtocolError::Undecodable));
        assert_eq!(decode("42").err(), Some(ProtocolError::Undecodable));
    }

    #[test]
    fn decode_accepts_mistyped_fields() {
        let Ok(frame) = decode(r#"{"id": 1, "type": 5, "method": 7, "headers": {"x-n": 1}}"#)
        else {
            panic!("object frames should decode");
        };
        assert_eq!(frame.id, Some(Value::from(1)));
        assert_eq!(frame.kind, Some(Value::from(5)));
        assert_eq!(frame.message_kind(), None);
    }

    #[test]
    fn decode_keeps_unvalidated_fields() {
        let Ok(frame) = decode(r#"{"id": 7, "type": "request", "path": "/"}"#) else {
            panic!("frame should decode");
        };
        assert_eq!(frame.id, Some(Value::from(7)));
        assert_eq!(frame.kind, Some(Value::from("request")));
        assert!(frame.method.is_none());
    }

    #[test]
    fn acyclic_node_encodes() {
        let node = Node {
            b: 3,
            c: RefCell::new(None),
        };
        assert_eq!(encode(&node).ok().as_deref(), Some(r#"{"b":3}"#));
    }

    #[tokio::test]
    async fn cyclic_payload_is_reported_not_sent() {
        let events = EventBus::new(8);
        let mut rx = events.subscribe();
        let connection_id = ConnectionId::new();

        let node = Node::cycle();
        let envelope = OutboundEnvelope::push(node.as_ref());
        let result = encode_reported(&envelope, envelope.kind.as_str(), connection_id, &events);
        assert!(result.is_err());

        let Ok(event) = rx.recv().await else {
            panic!("expected an operational event");
        };
        let GatewayEvent::SerializationFailed {
            envelope_type,
            connection_id: reported,
            ..
        } = event
        else {
            panic!("expected SerializationFailed, got {event:?}");
        };
        assert_eq!(envelope_type, "message");
        assert_eq!(reported, connection_id);

        let _ = node.c.borrow_mut().take();
    }
}
