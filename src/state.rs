//! Connection lifecycle state.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a client's connection.
///
/// ```text
/// Disconnected ──connect──▶ Connecting ──on_open──▶ Connected
///       ▲                        │                      │
///       └──── init failure ──────┘        on_close / disconnect
///                                                       ▼
///                                                    Closed
/// ```
///
/// `connect` may be called from any state and always moves to `Connecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection has been attempted, or the last attempt failed to start.
    #[default]
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// The transport reported the connection open.
    Connected,
    /// The connection was closed by the peer, the transport, or `disconnect`.
    Closed,
}

impl ConnectionState {
    /// Returns `true` only for [`ConnectionState::Connected`].
    #[must_use]
    #[inline]
    pub const fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Returns `true` while a connection is being established or is open.
    #[must_use]
    #[inline]
    pub const fn is_active(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Connected)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Closed => write!(f, "Closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_disconnected() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[test]
    fn only_connected_is_connected() {
        assert!(!ConnectionState::Disconnected.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Closed.is_connected());
    }

    #[test]
    fn active_states() {
        assert!(!ConnectionState::Disconnected.is_active());
        assert!(ConnectionState::Connecting.is_active());
        assert!(ConnectionState::Connected.is_active());
        assert!(!ConnectionState::Closed.is_active());
    }

    #[test]
    fn display() {
        assert_eq!(ConnectionState::Connecting.to_string(), "Connecting");
        assert_eq!(ConnectionState::Closed.to_string(), "Closed");
    }
}
