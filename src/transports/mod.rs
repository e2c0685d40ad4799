//! Transport implementations for the tick-socket client.
//!
//! This module provides concrete [`Connector`](crate::Connector) implementations
//! behind feature gates. Enable the corresponding Cargo feature to pull in
//! a transport:
//!
//! | Feature                | Connector              |
//! |------------------------|------------------------|
//! | `transport-websocket`  | [`WebSocketConnector`] |
//!
//! # Example
//!
//! ```rust,no_run
//! # fn example() -> tick_socket::Result<()> {
//! use tick_socket::{PollingClient, WebSocketConfig, WebSocketConnector};
//! use std::time::Duration;
//!
//! let connector = WebSocketConnector::with_config(
//!     WebSocketConfig::new().with_connect_timeout(Duration::from_secs(3)),
//! )?;
//! let mut client = PollingClient::new(connector);
//! client.connect("ws://localhost:8080/ws")?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "transport-websocket")]
pub mod websocket;

#[cfg(feature = "transport-websocket")]
pub use websocket::{WebSocketConfig, WebSocketConnector, WebSocketTransport};
