//! Connection controller: owns one transport and the connection state.
//!
//! The controller is the only place that starts or ends connections and the
//! only path for outgoing messages. Transport callbacks reach it through the
//! [`TransportEvents`] handle minted for each [`connect`](ConnectionController::connect)
//! call, and push inbound events into the [`EventSink`] it was built with.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Result, TickSocketError};
use crate::event::{InboundEvent, Payload};
use crate::queue::EventSink;
use crate::state::ConnectionState;
use crate::transport::{Connector, Transport, TransportEvents};

/// Identifies one connection attempt.
///
/// A fresh id is minted on every `connect`, which lets callbacks from an
/// earlier, superseded transport be told apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

// ── Shared state ────────────────────────────────────────────────────

/// Connection slot shared between the controller and transport callbacks.
#[derive(Debug, Default)]
pub(crate) struct Slot {
    pub(crate) current: Option<ConnectionId>,
    pub(crate) state: ConnectionState,
    /// Set while `Connector::open` runs. Events reported in that window are
    /// held in `pending` until `open` succeeds and dropped if it fails.
    pub(crate) opening: bool,
    pub(crate) pending: Vec<InboundEvent>,
}

#[derive(Debug, Default)]
pub(crate) struct SharedState {
    slot: Mutex<Slot>,
}

impl SharedState {
    /// Lock the slot. A panic in another holder cannot leave the slot
    /// half-written, so poisoning is ignored.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Controller ──────────────────────────────────────────────────────

/// Owns the lifecycle of a single outbound connection and mediates all sends.
pub struct ConnectionController<C: Connector> {
    connector: C,
    transport: Option<C::Transport>,
    shared: Arc<SharedState>,
    sink: EventSink,
}

impl<C: Connector> ConnectionController<C> {
    /// Create a disconnected controller that reports inbound events to `sink`.
    pub fn new(connector: C, sink: EventSink) -> Self {
        Self {
            connector,
            transport: None,
            shared: Arc::new(SharedState::default()),
            sink,
        }
    }

    /// Begin connecting to `address`.
    ///
    /// Any existing connection is closed first. On success the connection
    /// attempt has been *initiated*: the state is
    /// [`Connecting`](ConnectionState::Connecting) until the transport
    /// reports it open.
    ///
    /// # Errors
    ///
    /// Returns [`TickSocketError::ConnectInit`] if the transport could not be
    /// constructed. The state is then
    /// [`Disconnected`](ConnectionState::Disconnected) and no event is queued.
    pub fn connect(&mut self, address: &str) -> Result<ConnectionId> {
        if self.transport.is_some() {
            debug!("closing previous connection before reconnecting");
            if let Err(e) = self.disconnect() {
                warn!("failed to close previous connection: {e}");
            }
        }

        let id = ConnectionId::new();
        {
            let mut slot = self.shared.lock();
            slot.current = Some(id);
            slot.state = ConnectionState::Connecting;
            slot.opening = true;
            slot.pending.clear();
        }
        debug!(connection_id = %id, address = %address, "connecting");

        let events = TransportEvents::new(id, Arc::clone(&self.shared), self.sink.clone());
        match self.connector.open(address, events) {
            Ok(transport) => {
                {
                    let mut slot = self.shared.lock();
                    slot.opening = false;
                    for event in slot.pending.drain(..) {
                        self.sink.enqueue(event);
                    }
                }
                self.transport = Some(transport);
                info!(connection_id = %id, address = %address, "connection initiated");
                Ok(id)
            }
            Err(e) => {
                warn!(
                    connection_id = %id,
                    address = %address,
                    "failed to initiate connection: {e}"
                );
                {
                    let mut slot = self.shared.lock();
                    slot.current = None;
                    slot.state = ConnectionState::Disconnected;
                    slot.opening = false;
                    if !slot.pending.is_empty() {
                        debug!(
                            connection_id = %id,
                            discarded = slot.pending.len(),
                            "discarding events reported by failed connect"
                        );
                        slot.pending.clear();
                    }
                }
                Err(match e {
                    TickSocketError::ConnectInit(description) => {
                        TickSocketError::ConnectInit(description)
                    }
                    other => TickSocketError::ConnectInit(other.to_string()),
                })
            }
        }
    }

    /// Close the current connection, if any.
    ///
    /// Callbacks from the closed transport are ignored from here on. Events
    /// already queued stay queued. Calling this without a connection is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns the transport's error if it failed to issue the close. The
    /// connection is considered closed regardless.
    pub fn disconnect(&mut self) -> Result<()> {
        let Some(mut transport) = self.transport.take() else {
            return Ok(());
        };

        let id = {
            let mut slot = self.shared.lock();
            slot.state = ConnectionState::Closed;
            slot.current.take()
        };
        if let Some(id) = id {
            debug!(connection_id = %id, "disconnecting");
        }

        transport.close()
    }

    /// Returns `true` iff the transport reported the connection open and it
    /// has not closed since.
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    /// Id of the current connection attempt, if any.
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.shared.lock().current
    }

    /// Send a payload on its text or binary path.
    ///
    /// # Errors
    ///
    /// See [`send_text`](Self::send_text).
    pub fn send(&mut self, payload: &Payload) -> Result<()> {
        match payload {
            Payload::Text(text) => self.send_text(text),
            Payload::Binary(data) => self.send_binary(data),
        }
    }

    /// Send a text message.
    ///
    /// # Errors
    ///
    /// Returns [`TickSocketError::NotConnected`] unless the state is
    /// [`Connected`](ConnectionState::Connected), or the transport's send error.
    pub fn send_text(&mut self, text: &str) -> Result<()> {
        self.connected_transport()?.send_text(text)
    }

    /// Send a binary message.
    ///
    /// # Errors
    ///
    /// Same as [`send_text`](Self::send_text).
    pub fn send_binary(&mut self, data: &[u8]) -> Result<()> {
        self.connected_transport()?.send_binary(data)
    }

    fn connected_transport(&mut self) -> Result<&mut C::Transport> {
        if !self.is_connected() {
            return Err(TickSocketError::NotConnected);
        }
        self.transport.as_mut().ok_or(TickSocketError::NotConnected)
    }
}

impl<C: Connector> std::fmt::Debug for ConnectionController<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.shared.lock();
        f.debug_struct("ConnectionController")
            .field("state", &slot.state)
            .field("connection_id", &slot.current)
            .field("has_transport", &self.transport.is_some())
            .finish()
    }
}

impl<C: Connector> Drop for ConnectionController<C> {
    fn drop(&mut self) {
        if let Err(e) = self.disconnect() {
            debug!("close on drop failed: {e}");
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::queue::{inbound_queue, InboundQueue};
    use std::sync::atomic::{AtomicUsize, Ordering};

    // ── Mock transport ──────────────────────────────────────────────

    #[derive(Default)]
    struct Recorded {
        sent: Mutex<Vec<Payload>>,
        events: Mutex<Vec<TransportEvents>>,
        closes: AtomicUsize,
    }

    struct MockTransport {
        recorded: Arc<Recorded>,
        closed: bool,
    }

    impl Transport for MockTransport {
        fn send_text(&mut self, text: &str) -> Result<()> {
            if self.closed {
                return Err(TickSocketError::TransportClosed);
            }
            self.recorded
                .sent
                .lock()
                .unwrap()
                .push(Payload::Text(text.to_owned()));
            Ok(())
        }

        fn send_binary(&mut self, data: &[u8]) -> Result<()> {
            if self.closed {
                return Err(TickSocketError::TransportClosed);
            }
            self.recorded
                .sent
                .lock()
                .unwrap()
                .push(Payload::Binary(data.to_vec()));
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            self.closed = true;
            self.recorded.closes.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    struct MockConnector {
        recorded: Arc<Recorded>,
        open_synchronously: bool,
    }

    impl Connector for MockConnector {
        type Transport = MockTransport;

        fn open(&self, address: &str, events: TransportEvents) -> Result<MockTransport> {
            if !address.starts_with("ws://") {
                return Err(TickSocketError::ConnectInit(format!("bad address {address}")));
            }
            if self.open_synchronously {
                events.on_open();
            }
            self.recorded.events.lock().unwrap().push(events);
            Ok(MockTransport {
                recorded: Arc::clone(&self.recorded),
                closed: false,
            })
        }
    }

    fn controller(
        open_synchronously: bool,
    ) -> (ConnectionController<MockConnector>, InboundQueue, Arc<Recorded>) {
        let recorded = Arc::new(Recorded::default());
        let connector = MockConnector {
            recorded: Arc::clone(&recorded),
            open_synchronously,
        };
        let (sink, queue) = inbound_queue();
        (ConnectionController::new(connector, sink), queue, recorded)
    }

    fn events(recorded: &Recorded, index: usize) -> TransportEvents {
        recorded.events.lock().unwrap()[index].clone()
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[test]
    fn new_controller_is_disconnected() {
        let (ctrl, _queue, _recorded) = controller(false);
        assert_eq!(ctrl.state(), ConnectionState::Disconnected);
        assert!(!ctrl.is_connected());
        assert!(ctrl.connection_id().is_none());
    }

    #[test]
    fn connect_moves_to_connecting_then_connected_on_open() {
        let (mut ctrl, _queue, recorded) = controller(false);
        let id = ctrl.connect("ws://host").unwrap();
        assert_eq!(ctrl.state(), ConnectionState::Connecting);
        assert_eq!(ctrl.connection_id(), Some(id));
        assert!(!ctrl.is_connected());

        events(&recorded, 0).on_open();
        assert_eq!(ctrl.state(), ConnectionState::Connected);
        assert!(ctrl.is_connected());
    }

    #[test]
    fn open_during_construction_is_honored() {
        let (mut ctrl, _queue, _recorded) = controller(true);
        ctrl.connect("ws://host").unwrap();
        assert!(ctrl.is_connected());
    }

    #[test]
    fn connect_init_failure_leaves_disconnected() {
        let (mut ctrl, mut queue, _recorded) = controller(false);
        let err = ctrl.connect("not-a-valid-address").unwrap_err();
        assert!(matches!(err, TickSocketError::ConnectInit(_)));
        assert_eq!(ctrl.state(), ConnectionState::Disconnected);
        assert!(ctrl.connection_id().is_none());
        assert!(queue.try_dequeue().is_none());
    }

    /// Reports an error and a message from inside `open`, then succeeds or fails.
    struct ChattyConnector {
        fail: bool,
    }

    impl Connector for ChattyConnector {
        type Transport = MockTransport;

        fn open(&self, _address: &str, events: TransportEvents) -> Result<MockTransport> {
            events.on_error("constructor threw");
            events.on_message(Payload::Text("early".into()));
            if self.fail {
                return Err(TickSocketError::ConnectInit("rejected".into()));
            }
            Ok(MockTransport {
                recorded: Arc::new(Recorded::default()),
                closed: false,
            })
        }
    }

    #[test]
    fn failed_open_discards_events_reported_during_open() {
        let (sink, mut queue) = inbound_queue();
        let mut ctrl = ConnectionController::new(ChattyConnector { fail: true }, sink);

        assert!(matches!(
            ctrl.connect("ws://host"),
            Err(TickSocketError::ConnectInit(_))
        ));
        assert_eq!(ctrl.state(), ConnectionState::Disconnected);
        assert!(queue.try_dequeue().is_none());
    }

    #[test]
    fn successful_open_delivers_events_reported_during_open_in_order() {
        let (sink, mut queue) = inbound_queue();
        let mut ctrl = ConnectionController::new(ChattyConnector { fail: false }, sink);

        ctrl.connect("ws://host").unwrap();
        assert_eq!(
            queue.try_dequeue(),
            Some(InboundEvent::TransportError {
                description: "constructor threw".into()
            })
        );
        assert_eq!(
            queue.try_dequeue(),
            Some(InboundEvent::Message {
                payload: Payload::Text("early".into())
            })
        );
        assert!(queue.try_dequeue().is_none());
    }

    #[test]
    fn send_while_not_connected_fails_fast() {
        let (mut ctrl, _queue, recorded) = controller(false);
        assert!(matches!(
            ctrl.send_text("early"),
            Err(TickSocketError::NotConnected)
        ));

        ctrl.connect("ws://host").unwrap();
        assert!(matches!(
            ctrl.send_binary(&[1]),
            Err(TickSocketError::NotConnected)
        ));
        assert!(recorded.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn send_dispatches_on_payload_kind() {
        let (mut ctrl, _queue, recorded) = controller(true);
        ctrl.connect("ws://host").unwrap();

        ctrl.send(&Payload::Text("hello".into())).unwrap();
        ctrl.send(&Payload::Binary(vec![0x01, 0x02, 0xFF])).unwrap();

        let sent = recorded.sent.lock().unwrap();
        assert_eq!(
            *sent,
            vec![
                Payload::Text("hello".into()),
                Payload::Binary(vec![0x01, 0x02, 0xFF])
            ]
        );
    }

    #[test]
    fn error_is_queued_and_keeps_state() {
        let (mut ctrl, mut queue, recorded) = controller(true);
        ctrl.connect("ws://host").unwrap();

        events(&recorded, 0).on_error("socket closed");
        assert!(ctrl.is_connected());
        assert_eq!(
            queue.try_dequeue(),
            Some(InboundEvent::TransportError {
                description: "socket closed".into()
            })
        );
    }

    #[test]
    fn close_callback_moves_to_closed() {
        let (mut ctrl, _queue, recorded) = controller(true);
        ctrl.connect("ws://host").unwrap();

        events(&recorded, 0).on_close(Some("going away".into()));
        assert_eq!(ctrl.state(), ConnectionState::Closed);
        assert!(matches!(
            ctrl.send_text("late"),
            Err(TickSocketError::NotConnected)
        ));
    }

    #[test]
    fn disconnect_closes_transport_and_silences_callbacks() {
        let (mut ctrl, mut queue, recorded) = controller(true);
        ctrl.connect("ws://host").unwrap();
        let stale = events(&recorded, 0);

        ctrl.disconnect().unwrap();
        assert_eq!(ctrl.state(), ConnectionState::Closed);
        assert_eq!(recorded.closes.load(Ordering::Relaxed), 1);
        assert!(!stale.is_current());

        stale.on_message(Payload::Text("ghost".into()));
        stale.on_error("ghost error");
        stale.on_open();
        assert!(queue.try_dequeue().is_none());
        assert_eq!(ctrl.state(), ConnectionState::Closed);
    }

    #[test]
    fn disconnect_is_idempotent() {
        let (mut ctrl, _queue, recorded) = controller(true);
        ctrl.disconnect().unwrap();
        assert_eq!(ctrl.state(), ConnectionState::Disconnected);

        ctrl.connect("ws://host").unwrap();
        ctrl.disconnect().unwrap();
        ctrl.disconnect().unwrap();
        assert_eq!(recorded.closes.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn reconnect_closes_previous_transport() {
        let (mut ctrl, mut queue, recorded) = controller(false);
        let first = ctrl.connect("ws://one").unwrap();
        let second = ctrl.connect("ws://two").unwrap();
        assert_ne!(first, second);
        assert_eq!(recorded.closes.load(Ordering::Relaxed), 1);
        assert_eq!(ctrl.state(), ConnectionState::Connecting);

        // The superseded transport can no longer open or enqueue.
        events(&recorded, 0).on_open();
        events(&recorded, 0).on_message(Payload::Text("old".into()));
        assert_eq!(ctrl.state(), ConnectionState::Connecting);
        assert!(queue.try_dequeue().is_none());

        events(&recorded, 1).on_open();
        events(&recorded, 1).on_message(Payload::Text("new".into()));
        assert!(ctrl.is_connected());
        assert_eq!(
            queue.try_dequeue(),
            Some(InboundEvent::Message {
                payload: Payload::Text("new".into())
            })
        );
    }

    #[test]
    fn failed_reconnect_still_closes_previous() {
        let (mut ctrl, _queue, recorded) = controller(true);
        ctrl.connect("ws://one").unwrap();
        assert!(ctrl.connect("bogus").is_err());
        assert_eq!(recorded.closes.load(Ordering::Relaxed), 1);
        assert_eq!(ctrl.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn drop_closes_transport() {
        let (mut ctrl, _queue, recorded) = controller(true);
        ctrl.connect("ws://host").unwrap();
        drop(ctrl);
        assert_eq!(recorded.closes.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn debug_impl_for_controller() {
        let (ctrl, _queue, _recorded) = controller(false);
        let debug = format!("{ctrl:?}");
        assert!(debug.contains("ConnectionController"));
        assert!(debug.contains("Disconnected"));
    }
}
