//! Transport abstraction for the tick-socket client.
//!
//! A transport is split into two traits:
//!
//! - [`Connector`] constructs a transport for an address. Construction must
//!   not wait for the connection to be established; it only fails for
//!   problems it can detect synchronously (malformed address, unsupported
//!   scheme, environment restrictions).
//! - [`Transport`] is the handle to one connection attempt. Its methods hand
//!   outgoing messages to the underlying socket and return immediately.
//!
//! Everything the socket reports later (open, incoming messages, errors,
//! close) is delivered through the [`TransportEvents`] handle passed to
//! [`Connector::open`]. The handle is `Send + Sync + Clone`, so callbacks may
//! fire from any thread, including from inside `open` itself. Messages and
//! errors reported before `open` returns are delivered only if it succeeds.
//!
//! # Implementing a Custom Transport
//!
//! ```rust
//! use tick_socket::{Connector, Payload, Result, Transport, TransportEvents};
//!
//! /// Echoes every outgoing message straight back.
//! struct Loopback {
//!     events: TransportEvents,
//! }
//!
//! impl Transport for Loopback {
//!     fn send_text(&mut self, text: &str) -> Result<()> {
//!         self.events.on_message(Payload::Text(text.to_owned()));
//!         Ok(())
//!     }
//!
//!     fn send_binary(&mut self, data: &[u8]) -> Result<()> {
//!         self.events.on_message(Payload::Binary(data.to_vec()));
//!         Ok(())
//!     }
//!
//!     fn close(&mut self) -> Result<()> {
//!         self.events.on_close(None);
//!         Ok(())
//!     }
//! }
//!
//! struct LoopbackConnector;
//!
//! impl Connector for LoopbackConnector {
//!     type Transport = Loopback;
//!
//!     fn open(&self, _address: &str, events: TransportEvents) -> Result<Loopback> {
//!         events.on_open();
//!         Ok(Loopback { events })
//!     }
//! }
//! ```

use std::sync::Arc;

use tracing::debug;

use crate::controller::{ConnectionId, SharedState, Slot};
use crate::error::Result;
use crate::event::{InboundEvent, Payload};
use crate::queue::EventSink;
use crate::state::ConnectionState;

/// Handle to a single connection created by a [`Connector`].
///
/// None of these methods may block on network I/O.
pub trait Transport: Send + 'static {
    /// Queue a text message for sending.
    ///
    /// # Errors
    ///
    /// Returns [`TickSocketError::TransportSend`](crate::TickSocketError::TransportSend)
    /// if the message was rejected, or
    /// [`TickSocketError::TransportClosed`](crate::TickSocketError::TransportClosed)
    /// if the transport was already closed.
    fn send_text(&mut self, text: &str) -> Result<()>;

    /// Queue a binary message for sending.
    ///
    /// # Errors
    ///
    /// Same as [`send_text`](Transport::send_text).
    fn send_binary(&mut self, data: &[u8]) -> Result<()>;

    /// Start closing the connection.
    ///
    /// Must be idempotent. Implementations should release resources even if
    /// the close handshake cannot be performed.
    ///
    /// # Errors
    ///
    /// Returns an error if the close request could not be issued.
    fn close(&mut self) -> Result<()>;
}

/// Constructs [`Transport`]s.
pub trait Connector {
    /// The transport this connector produces.
    type Transport: Transport;

    /// Begin connecting to `address` and return the transport handle.
    ///
    /// The connection is not expected to be open when this returns. The
    /// transport reports progress through `events`.
    ///
    /// # Errors
    ///
    /// Returns [`TickSocketError::ConnectInit`](crate::TickSocketError::ConnectInit)
    /// if the transport cannot be constructed.
    fn open(&self, address: &str, events: TransportEvents) -> Result<Self::Transport>;
}

/// Callback handle a transport uses to report asynchronous events.
///
/// Each handle is bound to the connection it was created for. Once that
/// connection is superseded by a new `connect` or ended by `disconnect`,
/// every callback on the handle becomes a no-op.
#[derive(Clone)]
pub struct TransportEvents {
    id: ConnectionId,
    shared: Arc<SharedState>,
    sink: EventSink,
}

impl TransportEvents {
    pub(crate) fn new(id: ConnectionId, shared: Arc<SharedState>, sink: EventSink) -> Self {
        Self { id, shared, sink }
    }

    /// The connection these callbacks belong to.
    pub fn connection_id(&self) -> ConnectionId {
        self.id
    }

    /// Returns `false` once the connection has been superseded or disconnected.
    pub fn is_current(&self) -> bool {
        self.shared.lock().current == Some(self.id)
    }

    /// The connection was established.
    pub fn on_open(&self) {
        let mut slot = self.shared.lock();
        if slot.current != Some(self.id) {
            debug!(connection_id = %self.id, "ignoring open from stale connection");
            return;
        }
        if slot.state == ConnectionState::Connecting {
            slot.state = ConnectionState::Connected;
            debug!(connection_id = %self.id, "state: connected");
        }
    }

    /// A message arrived from the peer.
    pub fn on_message(&self, payload: Payload) {
        let mut slot = self.shared.lock();
        if slot.current != Some(self.id) {
            debug!(connection_id = %self.id, "dropping message from stale connection");
            return;
        }
        // Enqueue while the slot is held so a concurrent disconnect cannot
        // slip in between the check and the push.
        self.deliver(&mut slot, InboundEvent::Message { payload });
    }

    /// The transport reported an error.
    ///
    /// Errors are queued for the host and leave the connection state as is.
    /// A transport whose connection is lost must also call
    /// [`on_close`](Self::on_close).
    pub fn on_error(&self, description: impl Into<String>) {
        let mut slot = self.shared.lock();
        if slot.current != Some(self.id) {
            debug!(connection_id = %self.id, "dropping error from stale connection");
            return;
        }
        let description = description.into();
        debug!(connection_id = %self.id, %description, "transport error queued");
        self.deliver(&mut slot, InboundEvent::TransportError { description });
    }

    /// The connection closed, or could not be established.
    pub fn on_close(&self, reason: Option<String>) {
        let mut slot = self.shared.lock();
        if slot.current != Some(self.id) {
            return;
        }
        if slot.state.is_active() {
            slot.state = ConnectionState::Closed;
            debug!(connection_id = %self.id, ?reason, "state: closed");
        }
    }
}

impl TransportEvents {
    /// Enqueue `event`, or hold it while the connector is still inside `open`.
    fn deliver(&self, slot: &mut Slot, event: InboundEvent) {
        if slot.opening {
            slot.pending.push(event);
        } else {
            self.sink.enqueue(event);
        }
    }
}

impl std::fmt::Debug for TransportEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportEvents")
            .field("connection_id", &self.id)
            .field("current", &self.is_current())
            .finish()
    }
}
