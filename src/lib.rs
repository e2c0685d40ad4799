//! # tick-socket
//!
//! Non-blocking WebSocket client for hosts that run a frame loop.
//!
//! Games and other interactive programs usually poll for input once per
//! tick rather than reacting to callbacks. This crate bridges the
//! callback-driven world of a socket into that model: transport callbacks
//! push [`InboundEvent`]s into a FIFO queue, and the host drains it with
//! [`PollingClient::try_recv`] whenever it likes. No call ever blocks.
//!
//! ## Features
//!
//! - **Poll-driven**: `connect`, `send_*` and `try_recv` all return immediately
//! - **Ordered**: events are delivered in exactly the order the transport reported them
//! - **Transport-agnostic**: implement [`Connector`] and [`Transport`] for any backend
//! - **WebSocket built-in**: default `transport-websocket` feature provides [`WebSocketConnector`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # fn example() -> tick_socket::Result<()> {
//! use tick_socket::{InboundEvent, PollingClient};
//!
//! let mut client = PollingClient::websocket()?;
//! client.connect("ws://localhost:8080/ws")?;
//!
//! // In the frame loop:
//! while let Some(event) = client.try_recv() {
//!     match event.into_result() {
//!         Ok(payload) => println!("received {} bytes", payload.len()),
//!         Err(description) => eprintln!("transport error: {description}"),
//!     }
//! }
//! if client.is_connected() {
//!     client.send_text("hello")?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod controller;
pub mod error;
pub mod event;
pub mod queue;
pub mod state;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use client::PollingClient;
pub use controller::{ConnectionController, ConnectionId};
pub use error::{Result, TickSocketError};
pub use event::{InboundEvent, Payload};
pub use queue::{inbound_queue, EventSink, InboundQueue};
pub use state::ConnectionState;
pub use transport::{Connector, Transport, TransportEvents};

#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConfig, WebSocketConnector, WebSocketTransport};
