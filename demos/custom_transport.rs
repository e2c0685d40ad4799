//! # Custom Transport Example
//!
//! Shows how to implement the [`Connector`] and [`Transport`] traits with an
//! in-process "server" running on its own thread. This is useful for:
//!
//! - **Testing**: exercise your frame loop without a real server
//! - **Custom backends**: adapt any callback-driven I/O layer
//!
//! ## Running
//!
//! ```sh
//! cargo run --example custom_transport
//! ```

use std::thread;
use std::time::Duration;

use tick_socket::{
    Connector, InboundEvent, Payload, PollingClient, Result, TickSocketError, Transport,
    TransportEvents,
};
use tokio::sync::mpsc;

// ─────────────────────────────────────────────────────────────────────
// Step 1: Define the transport handle
// ─────────────────────────────────────────────────────────────────────

/// Client half: forwards outgoing payloads to the server thread.
struct ThreadTransport {
    tx: Option<mpsc::UnboundedSender<Payload>>,
}

impl Transport for ThreadTransport {
    fn send_text(&mut self, text: &str) -> Result<()> {
        self.forward(Payload::Text(text.to_owned()))
    }

    fn send_binary(&mut self, data: &[u8]) -> Result<()> {
        self.forward(Payload::Binary(data.to_vec()))
    }

    fn close(&mut self) -> Result<()> {
        // Dropping the sender ends the server thread.
        self.tx = None;
        Ok(())
    }
}

impl ThreadTransport {
    fn forward(&self, payload: Payload) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(TickSocketError::TransportClosed)?;
        tx.send(payload)
            .map_err(|e| TickSocketError::TransportSend(e.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 2: Define the connector
// ─────────────────────────────────────────────────────────────────────

/// Spawns a thread per connection that answers every message with its
/// uppercase echo, reporting through the callback handle like a socket would.
struct EchoConnector;

impl Connector for EchoConnector {
    type Transport = ThreadTransport;

    fn open(&self, address: &str, events: TransportEvents) -> Result<ThreadTransport> {
        if !address.starts_with("echo://") {
            return Err(TickSocketError::ConnectInit(format!(
                "expected an echo:// address, got {address}"
            )));
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<Payload>();
        thread::spawn(move || {
            // Pretend the handshake takes a few frames.
            thread::sleep(Duration::from_millis(50));
            events.on_open();

            while let Some(payload) = rx.blocking_recv() {
                match payload {
                    Payload::Text(text) => events.on_message(Payload::Text(text.to_uppercase())),
                    Payload::Binary(data) if data.is_empty() => {
                        events.on_error("empty binary frame");
                    }
                    Payload::Binary(data) => events.on_message(Payload::Binary(data)),
                }
            }
            events.on_close(None);
        });

        Ok(ThreadTransport { tx: Some(tx) })
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 3: Drive it from a frame loop
// ─────────────────────────────────────────────────────────────────────

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut client = PollingClient::new(EchoConnector);

    // A bad address fails synchronously.
    if let Err(e) = client.connect("http://example.com") {
        tracing::info!("rejected as expected: {e}");
    }

    client.connect("echo://local")?;

    let outgoing = ["hello", "from", "the", "frame", "loop"];
    let mut next = 0;
    let mut sent_binary = false;

    for frame in 0..120 {
        while let Some(event) = client.try_recv() {
            match event {
                InboundEvent::Message { payload } => {
                    tracing::info!(frame, ?payload, "received");
                }
                InboundEvent::TransportError { description } => {
                    tracing::warn!(frame, %description, "transport error");
                }
            }
        }

        if client.is_connected() {
            if let Some(word) = outgoing.get(next) {
                client.send_text(word)?;
                next += 1;
            } else if !sent_binary {
                client.send_binary(&[])?;
                client.send_binary(&[0xCA, 0xFE])?;
                sent_binary = true;
            }
        }

        thread::sleep(Duration::from_millis(16));
    }

    client.disconnect()?;
    tracing::info!(state = %client.state(), "done");
    Ok(())
}
