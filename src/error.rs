//! Error types for the tick-socket client.

use thiserror::Error;

/// Errors that can occur when using a [`PollingClient`](crate::PollingClient).
///
/// Only synchronous failures are reported through this type. Failures the
/// transport reports after the connection attempt was initiated arrive as
/// [`InboundEvent::TransportError`](crate::InboundEvent::TransportError) on
/// the inbound queue instead.
#[derive(Debug, Error)]
pub enum TickSocketError {
    /// The transport could not be constructed for the given address.
    #[error("failed to initiate connection: {0}")]
    ConnectInit(String),

    /// Attempted an operation that requires an open connection, but the client is not connected.
    #[error("not connected")]
    NotConnected,

    /// The transport rejected an outgoing message.
    ///
    /// Raised by custom [`Transport`](crate::Transport) implementations whose
    /// socket refuses a message synchronously. The WebSocket transport hands
    /// messages to its connection task and reports write failures later as
    /// [`InboundEvent::TransportError`](crate::InboundEvent::TransportError).
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// The transport has already been closed.
    #[error("transport connection closed")]
    TransportClosed,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for tick-socket operations.
pub type Result<T> = std::result::Result<T, TickSocketError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_description() {
        let err = TickSocketError::ConnectInit("unsupported URL scheme".into());
        assert_eq!(
            err.to_string(),
            "failed to initiate connection: unsupported URL scheme"
        );
    }

    #[test]
    fn transport_send_display() {
        let err = TickSocketError::TransportSend("buffer full".into());
        assert_eq!(err.to_string(), "transport send error: buffer full");
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::other("no runtime");
        let err: TickSocketError = io.into();
        assert!(matches!(err, TickSocketError::Io(_)));
    }
}
