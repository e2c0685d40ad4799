//! Payload and inbound event types.
//!
//! Every value the transport pushes towards the host is an [`InboundEvent`].
//! Both event variants travel through the same queue and are distinguished
//! only by their tag, so a host's poll loop handles messages and transport
//! errors in one `match`.

use serde::{Deserialize, Serialize};

/// The body of a WebSocket message, either text or binary.
///
/// Payloads are carried verbatim in both directions: no re-encoding, no
/// chunking, no framing beyond what the transport does itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload {
    /// A UTF-8 text message.
    Text(String),
    /// A binary message.
    Binary(#[serde(with = "serde_bytes")] Vec<u8>),
}

impl Payload {
    /// Returns `true` for text payloads.
    pub fn is_text(&self) -> bool {
        matches!(self, Payload::Text(_))
    }

    /// Raw bytes of the payload. For text this is the UTF-8 encoding.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Text(text) => text.as_bytes(),
            Payload::Binary(data) => data,
        }
    }

    /// Returns the text if this is a text payload.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            Payload::Binary(_) => None,
        }
    }

    /// Consumes the payload and returns its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Payload::Text(text) => text.into_bytes(),
            Payload::Binary(data) => data,
        }
    }

    /// Length of the payload in bytes.
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Returns `true` if the payload carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_owned())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(data: Vec<u8>) -> Self {
        Payload::Binary(data)
    }
}

impl From<&[u8]> for Payload {
    fn from(data: &[u8]) -> Self {
        Payload::Binary(data.to_vec())
    }
}

/// An event pushed by the transport and queued for the host's poll loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    /// A message received from the peer.
    Message {
        /// The message body, tagged text or binary.
        payload: Payload,
    },
    /// A transport-level failure reported after the connection was initiated.
    ///
    /// An error does not by itself mean the connection is gone. Check
    /// [`PollingClient::is_connected`](crate::PollingClient::is_connected).
    TransportError {
        /// Human-readable description supplied by the transport.
        description: String,
    },
}

impl InboundEvent {
    /// Returns `true` if this is a text message.
    pub fn is_text(&self) -> bool {
        matches!(self, InboundEvent::Message { payload } if payload.is_text())
    }

    /// Returns the payload if this event is a message.
    pub fn payload(&self) -> Option<&Payload> {
        match self {
            InboundEvent::Message { payload } => Some(payload),
            InboundEvent::TransportError { .. } => None,
        }
    }

    /// Converts the event into the `Result` shape most hosts branch on:
    /// `Ok(payload)` for messages, `Err(description)` for transport errors.
    pub fn into_result(self) -> std::result::Result<Payload, String> {
        match self {
            InboundEvent::Message { payload } => Ok(payload),
            InboundEvent::TransportError { description } => Err(description),
        }
    }
}

impl From<Payload> for InboundEvent {
    fn from(payload: Payload) -> Self {
        InboundEvent::Message { payload }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn payload_tags() {
        assert!(Payload::from("ping").is_text());
        assert!(!Payload::from(vec![0x00, 0x10]).is_text());
    }

    #[test]
    fn payload_bytes_are_verbatim() {
        let payload = Payload::from(&[0x01, 0x02, 0xFF][..]);
        assert_eq!(payload.as_bytes(), &[0x01, 0x02, 0xFF]);
        assert_eq!(payload.len(), 3);
        assert_eq!(payload.as_text(), None);
        assert_eq!(payload.into_bytes(), vec![0x01, 0x02, 0xFF]);
    }

    #[test]
    fn text_payload_as_text() {
        let payload = Payload::from(String::from("hello"));
        assert_eq!(payload.as_text(), Some("hello"));
        assert_eq!(payload.as_bytes(), b"hello");
        assert!(!payload.is_empty());
        assert!(Payload::Binary(Vec::new()).is_empty());
    }

    #[test]
    fn event_accessors() {
        let message = InboundEvent::from(Payload::from("ping"));
        assert!(message.is_text());
        assert_eq!(message.payload(), Some(&Payload::Text("ping".into())));

        let error = InboundEvent::TransportError {
            description: "socket closed".into(),
        };
        assert!(!error.is_text());
        assert!(error.payload().is_none());
        assert_eq!(error.into_result(), Err("socket closed".to_string()));
    }

    #[test]
    fn message_serializes_with_tags() {
        let event = InboundEvent::from(Payload::from("ping"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "message");
        assert_eq!(json["payload"]["kind"], "text");
        assert_eq!(json["payload"]["data"], "ping");
    }

    #[test]
    fn binary_event_survives_json() {
        let event = InboundEvent::from(Payload::from(vec![0x00, 0x10, 0xFF]));
        let json = serde_json::to_string(&event).unwrap();
        let back: InboundEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
