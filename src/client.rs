//! Poll-driven client facade.
//!
//! [`PollingClient`] is the single type a host integrates against. It owns a
//! [`ConnectionController`] and the consumer half of the inbound queue, and
//! never blocks: `connect` only initiates the connection, `send_*` hands the
//! message to the transport, and [`try_recv`](PollingClient::try_recv)
//! returns immediately whether or not an event is waiting.
//!
//! # Example
//!
//! ```rust,no_run
//! # fn example() -> tick_socket::Result<()> {
//! use tick_socket::{InboundEvent, Payload, PollingClient};
//!
//! let mut client = PollingClient::websocket()?;
//! client.connect("ws://localhost:8080/ws")?;
//!
//! loop {
//!     // once per frame
//!     while let Some(event) = client.try_recv() {
//!         match event {
//!             InboundEvent::Message { payload: Payload::Text(text) } => println!("{text}"),
//!             InboundEvent::Message { payload: Payload::Binary(data) } => {
//!                 println!("{} bytes", data.len())
//!             }
//!             InboundEvent::TransportError { description } => eprintln!("{description}"),
//!         }
//!     }
//!     if client.is_connected() {
//!         client.send_text("tick")?;
//!     }
//! #   break;
//! }
//! # Ok(())
//! # }
//! ```

use crate::controller::{ConnectionController, ConnectionId};
use crate::error::Result;
use crate::event::{InboundEvent, Payload};
use crate::queue::{inbound_queue, InboundQueue};
use crate::state::ConnectionState;
use crate::transport::Connector;

#[cfg(feature = "transport-websocket")]
use crate::transports::websocket::{WebSocketConfig, WebSocketConnector};

/// Non-blocking client for one connection at a time.
///
/// Independent instances do not share any state, so a host can hold as many
/// as it needs.
pub struct PollingClient<C: Connector> {
    controller: ConnectionController<C>,
    inbound: InboundQueue,
}

impl<C: Connector> PollingClient<C> {
    /// Create a disconnected client that opens connections through `connector`.
    pub fn new(connector: C) -> Self {
        let (sink, inbound) = inbound_queue();
        Self {
            controller: ConnectionController::new(connector, sink),
            inbound,
        }
    }

    /// Begin connecting to `address`, closing any existing connection first.
    ///
    /// Returns as soon as the attempt is initiated. Poll
    /// [`is_connected`](Self::is_connected) to learn when it opens, and
    /// [`try_recv`](Self::try_recv) for errors reported along the way.
    ///
    /// # Errors
    ///
    /// Returns [`TickSocketError::ConnectInit`](crate::TickSocketError::ConnectInit)
    /// if the transport could not be constructed.
    pub fn connect(&mut self, address: &str) -> Result<ConnectionId> {
        self.controller.connect(address)
    }

    /// Close the current connection, if any. Queued events stay retrievable.
    ///
    /// # Errors
    ///
    /// Returns the transport's error if it failed to issue the close.
    pub fn disconnect(&mut self) -> Result<()> {
        self.controller.disconnect()
    }

    /// Returns `true` if the connection is open.
    pub fn is_connected(&self) -> bool {
        self.controller.is_connected()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.controller.state()
    }

    /// Id of the current connection attempt, if any.
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.controller.connection_id()
    }

    /// Send a payload, choosing the text or binary path from its kind.
    ///
    /// # Errors
    ///
    /// Returns [`TickSocketError::NotConnected`](crate::TickSocketError::NotConnected)
    /// if the connection is not open, or the transport's send error.
    pub fn send(&mut self, payload: &Payload) -> Result<()> {
        self.controller.send(payload)
    }

    /// Send a text message.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub fn send_text(&mut self, text: &str) -> Result<()> {
        self.controller.send_text(text)
    }

    /// Send a binary message.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub fn send_binary(&mut self, data: &[u8]) -> Result<()> {
        self.controller.send_binary(data)
    }

    /// Take the oldest inbound event, or `None` if nothing is waiting.
    pub fn try_recv(&mut self) -> Option<InboundEvent> {
        self.inbound.try_dequeue()
    }
}

#[cfg(feature = "transport-websocket")]
impl PollingClient<WebSocketConnector> {
    /// Create a client backed by the bundled WebSocket transport with
    /// default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TickSocketError::Io`](crate::TickSocketError::Io) if the
    /// background I/O runtime cannot be started.
    pub fn websocket() -> Result<Self> {
        Self::websocket_with_config(WebSocketConfig::default())
    }

    /// Create a client backed by the bundled WebSocket transport.
    ///
    /// # Errors
    ///
    /// See [`websocket`](Self::websocket).
    pub fn websocket_with_config(config: WebSocketConfig) -> Result<Self> {
        Ok(Self::new(WebSocketConnector::with_config(config)?))
    }
}

impl<C: Connector> std::fmt::Debug for PollingClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingClient")
            .field("state", &self.state())
            .field("connection_id", &self.connection_id())
            .finish()
    }
}
