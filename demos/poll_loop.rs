//! # Poll Loop Example
//!
//! Demonstrates the intended integration: a fixed-rate host loop that
//! connects once, drains inbound events every frame, and sends a heartbeat
//! once the connection is open. No async code in the host.
//!
//! ## Running
//!
//! ```sh
//! # Start any WebSocket echo server on localhost:8080, then:
//! cargo run --example poll_loop
//!
//! # Override the server URL:
//! TICK_SOCKET_URL=ws://my-server:9000/ws cargo run --example poll_loop
//! ```

use std::time::{Duration, Instant};

use tick_socket::{ConnectionState, InboundEvent, Payload, PollingClient, WebSocketConfig};

/// Default server URL when `TICK_SOCKET_URL` is not set.
const DEFAULT_URL: &str = "ws://localhost:8080/ws";

/// Target frame time (60 Hz).
const FRAME: Duration = Duration::from_millis(16);

/// Send a heartbeat every this many frames.
const HEARTBEAT_FRAMES: u64 = 60;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let url = std::env::var("TICK_SOCKET_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let config = WebSocketConfig::new().with_connect_timeout(Duration::from_secs(5));

    // ── Connect ─────────────────────────────────────────────────────
    let mut client = PollingClient::websocket_with_config(config)?;
    let id = client.connect(&url)?;
    tracing::info!(connection_id = %id, "connecting to {url}");

    // ── Frame loop ──────────────────────────────────────────────────
    let mut frame: u64 = 0;
    let mut was_connected = false;
    loop {
        let started = Instant::now();

        while let Some(event) = client.try_recv() {
            match event {
                InboundEvent::Message {
                    payload: Payload::Text(text),
                } => tracing::info!(frame, "text: {text}"),
                InboundEvent::Message {
                    payload: Payload::Binary(data),
                } => tracing::info!(frame, "binary: {} bytes", data.len()),
                InboundEvent::TransportError { description } => {
                    tracing::warn!(frame, "transport error: {description}");
                }
            }
        }

        match client.state() {
            ConnectionState::Connected => {
                if !was_connected {
                    tracing::info!(frame, "connected");
                    was_connected = true;
                }
                if frame % HEARTBEAT_FRAMES == 0 {
                    client.send_text(&format!("heartbeat {frame}"))?;
                    client.send_binary(&frame.to_le_bytes())?;
                }
            }
            ConnectionState::Closed => {
                tracing::info!(frame, "connection closed, exiting");
                break;
            }
            ConnectionState::Connecting | ConnectionState::Disconnected => {}
        }

        frame += 1;
        if let Some(rest) = FRAME.checked_sub(started.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    Ok(())
}
