#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for tick-socket integration tests.
//!
//! Provides a scriptable [`MockConnector`] whose transports record every
//! outgoing payload and expose the [`TransportEvents`] handle, so tests can
//! play the role of the socket and fire open/message/error/close callbacks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tick_socket::{
    Connector, Payload, PollingClient, Result, TickSocketError, Transport, TransportEvents,
};

// ── Shared recordings ───────────────────────────────────────────────

/// Everything the mock transports observed, shared with the test body.
#[derive(Default)]
pub struct Recorder {
    /// Addresses passed to `open`, including rejected ones.
    pub addresses: StdMutex<Vec<String>>,
    /// Payloads sent through any transport, in order.
    pub sent: StdMutex<Vec<Payload>>,
    /// Callback handles, one per successfully opened transport.
    pub events: StdMutex<Vec<TransportEvents>>,
    /// Number of `close()` calls across all transports.
    pub closes: AtomicUsize,
}

impl Recorder {
    /// Callback handle of the `index`-th opened transport.
    pub fn events(&self, index: usize) -> TransportEvents {
        self.events.lock().unwrap()[index].clone()
    }

    /// Callback handle of the most recently opened transport.
    pub fn latest(&self) -> TransportEvents {
        self.events
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no transport opened")
    }

    pub fn sent(&self) -> Vec<Payload> {
        self.sent.lock().unwrap().clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::Relaxed)
    }
}

// ── MockTransport ───────────────────────────────────────────────────

/// Transport that records outgoing payloads.
pub struct MockTransport {
    recorder: Arc<Recorder>,
    closed: bool,
}

impl Transport for MockTransport {
    fn send_text(&mut self, text: &str) -> Result<()> {
        if self.closed {
            return Err(TickSocketError::TransportClosed);
        }
        self.recorder
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
        self.recorder
            .sent
            .lock()
            .unwrap()
            .push(Payload::Binary(data.to_vec()));
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.recorder.closes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

// ── MockConnector ───────────────────────────────────────────────────

/// Connector that accepts `ws://` / `wss://` addresses and rejects everything
/// else the way a socket constructor throws on a malformed URL.
pub struct MockConnector {
    recorder: Arc<Recorder>,
}

impl MockConnector {
    pub fn new() -> (Self, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        (
            Self {
                recorder: Arc::clone(&recorder),
            },
            recorder,
        )
    }
}

impl Connector for MockConnector {
    type Transport = MockTransport;

    fn open(&self, address: &str, events: TransportEvents) -> Result<MockTransport> {
        self.recorder
            .addresses
            .lock()
            .unwrap()
            .push(address.to_owned());
        if !(address.starts_with("ws://") || address.starts_with("wss://")) {
            return Err(TickSocketError::ConnectInit(format!(
                "SyntaxError: invalid URL {address}"
            )));
        }
        self.recorder.events.lock().unwrap().push(events);
        Ok(MockTransport {
            recorder: Arc::clone(&self.recorder),
            closed: false,
        })
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// A fresh, disconnected client plus its recorder.
pub fn new_client() -> (PollingClient<MockConnector>, Arc<Recorder>) {
    let (connector, recorder) = MockConnector::new();
    (PollingClient::new(connector), recorder)
}

/// A client whose transport has already reported open.
pub fn connected_client() -> (PollingClient<MockConnector>, Arc<Recorder>) {
    let (mut client, recorder) = new_client();
    client.connect("ws://localhost:8080/ws").unwrap();
    recorder.latest().on_open();
    assert!(client.is_connected());
    (client, recorder)
}
