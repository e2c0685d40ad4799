//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! [`WebSocketConnector`] turns the async `tokio-tungstenite` stream into the
//! callback-driven [`Transport`] the controller expects. Each connection runs
//! as one task on a tokio runtime: it performs the handshake, reports the
//! result through [`TransportEvents`], then multiplexes outgoing commands and
//! incoming frames with `tokio::select!`. The [`WebSocketTransport`] handle
//! only pushes commands onto an unbounded channel, so sending never waits on
//! the network.
//!
//! The runtime is either a dedicated current-thread runtime on a background
//! OS thread owned by the connector ([`WebSocketConnector::new`]) or one the
//! host already runs ([`WebSocketConnector::from_handle`]).
//!
//! # TLS
//!
//! `wss://` URLs are accepted, but TLS itself is provided by
//! `tokio-tungstenite`. Enable one of its TLS features (for example
//! `rustls-tls-webpki-roots`) in your own `Cargo.toml`; without one the
//! handshake fails and the failure is reported as a
//! [`TransportError`](crate::InboundEvent::TransportError).
//!
//! # Feature gate
//!
//! This module is only available when the `transport-websocket` feature is enabled
//! (it is enabled by default).

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};

use crate::controller::ConnectionId;
use crate::error::{Result, TickSocketError};
use crate::event::Payload;
use crate::transport::{Connector, Transport, TransportEvents};

/// Default timeout for the opening handshake.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default name of the background I/O thread.
const DEFAULT_RUNTIME_THREAD_NAME: &str = "tick-socket-io";

/// How long a stopping background runtime waits for its connections to
/// finish their close handshakes.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Type alias for the underlying WebSocket stream.
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`WebSocketConnector`].
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tick_socket::WebSocketConfig;
///
/// let config = WebSocketConfig::new()
///     .with_connect_timeout(Duration::from_secs(3))
///     .with_runtime_thread_name("game-net");
/// assert_eq!(config.connect_timeout, Duration::from_secs(3));
/// ```
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// How long the opening handshake may take before the attempt is
    /// abandoned and reported as a transport error.
    ///
    /// Defaults to **10 seconds**.
    pub connect_timeout: Duration,
    /// Name of the OS thread running the connector's own runtime. Unused
    /// with [`WebSocketConnector::from_handle`].
    ///
    /// Defaults to **`tick-socket-io`**.
    pub runtime_thread_name: String,
}

impl WebSocketConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            runtime_thread_name: DEFAULT_RUNTIME_THREAD_NAME.to_string(),
        }
    }

    /// Set the handshake timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the name of the background I/O thread.
    #[must_use]
    pub fn with_runtime_thread_name(mut self, name: impl Into<String>) -> Self {
        self.runtime_thread_name = name.into();
        self
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ── Connector ───────────────────────────────────────────────────────

/// Background thread driving a current-thread tokio runtime.
///
/// Every connection task holds a clone of `tasks`. On shutdown the runtime
/// keeps running until all clones are gone or [`SHUTDOWN_GRACE`] elapses, so
/// a close issued just before the drop still reaches the peer.
#[derive(Debug)]
struct RuntimeThread {
    shutdown_tx: Option<oneshot::Sender<()>>,
    tasks: Option<mpsc::Sender<()>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl RuntimeThread {
    fn spawn(name: &str) -> Result<(Self, Handle)> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let handle = runtime.handle().clone();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (tasks_tx, mut tasks_rx) = mpsc::channel::<()>(1);

        let thread = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                runtime.block_on(async {
                    // Resolves on explicit shutdown or when the sender is dropped.
                    let _ = shutdown_rx.await;
                    // `recv` yields `None` once every task guard is dropped.
                    if tokio::time::timeout(SHUTDOWN_GRACE, tasks_rx.recv())
                        .await
                        .is_err()
                    {
                        warn!("websocket connections still open at shutdown, abandoning them");
                    }
                });
                debug!("websocket runtime stopped");
            })?;

        Ok((
            Self {
                shutdown_tx: Some(shutdown_tx),
                tasks: Some(tasks_tx),
                thread: Some(thread),
            },
            handle,
        ))
    }

    /// Guard to be held by a connection task for as long as it runs.
    fn task_guard(&self) -> Option<mpsc::Sender<()>> {
        self.tasks.clone()
    }
}

impl Drop for RuntimeThread {
    fn drop(&mut self) {
        self.tasks = None;
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("websocket runtime thread panicked");
            }
        }
    }
}

/// A [`Connector`] that opens WebSocket connections with `tokio-tungstenite`.
///
/// Dropping a connector created with [`new`](Self::new) stops its runtime,
/// which ends every connection it opened.
#[derive(Debug)]
pub struct WebSocketConnector {
    handle: Handle,
    config: WebSocketConfig,
    runtime: Option<RuntimeThread>,
}

impl WebSocketConnector {
    /// Create a connector with its own background runtime and default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TickSocketError::Io`] if the runtime or its thread cannot be created.
    pub fn new() -> Result<Self> {
        Self::with_config(WebSocketConfig::default())
    }

    /// Create a connector with its own background runtime.
    ///
    /// # Errors
    ///
    /// Returns [`TickSocketError::Io`] if the runtime or its thread cannot be created.
    pub fn with_config(config: WebSocketConfig) -> Result<Self> {
        let (runtime, handle) = RuntimeThread::spawn(&config.runtime_thread_name)?;
        debug!(thread = %config.runtime_thread_name, "websocket runtime started");
        Ok(Self {
            handle,
            config,
            runtime: Some(runtime),
        })
    }

    /// Create a connector that spawns connection tasks on an existing runtime.
    ///
    /// The runtime must have I/O and time drivers enabled.
    pub fn from_handle(handle: Handle, config: WebSocketConfig) -> Self {
        Self {
            handle,
            config,
            runtime: None,
        }
    }

    /// The configuration this connector was created with.
    pub fn config(&self) -> &WebSocketConfig {
        &self.config
    }
}

impl Connector for WebSocketConnector {
    type Transport = WebSocketTransport;

    fn open(&self, address: &str, events: TransportEvents) -> Result<WebSocketTransport> {
        let request = address.into_client_request().map_err(|e| {
            TickSocketError::ConnectInit(format!("invalid address {address:?}: {e}"))
        })?;
        match request.uri().scheme_str() {
            Some("ws" | "wss") => {}
            other => {
                return Err(TickSocketError::ConnectInit(format!(
                    "unsupported URL scheme {other:?} in {address:?}, expected ws or wss"
                )));
            }
        }

        let connection_id = events.connection_id();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let guard = self.runtime.as_ref().and_then(RuntimeThread::task_guard);
        let connect_timeout = self.config.connect_timeout;
        self.handle.spawn(async move {
            let _guard = guard;
            connection_task(request, commands_rx, events, connect_timeout).await;
        });

        Ok(WebSocketTransport {
            commands: commands_tx,
            connection_id,
            closed: false,
        })
    }
}

// ── Transport ───────────────────────────────────────────────────────

#[derive(Debug)]
enum Command {
    Send(Message),
    Close,
}

/// Handle to one WebSocket connection task.
///
/// Dropping the handle closes the connection.
#[derive(Debug)]
pub struct WebSocketTransport {
    commands: mpsc::UnboundedSender<Command>,
    connection_id: ConnectionId,
    closed: bool,
}

impl WebSocketTransport {
    fn push(&self, message: Message) -> Result<()> {
        if self.closed {
            return Err(TickSocketError::TransportClosed);
        }
        self.commands
            .send(Command::Send(message))
            .map_err(|_| TickSocketError::TransportClosed)
    }
}

impl Transport for WebSocketTransport {
    fn send_text(&mut self, text: &str) -> Result<()> {
        self.push(Message::text(text.to_owned()))
    }

    fn send_binary(&mut self, data: &[u8]) -> Result<()> {
        self.push(Message::binary(data.to_vec()))
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if self.commands.send(Command::Close).is_err() {
            debug!(connection_id = %self.connection_id, "connection task already finished");
        }
        Ok(())
    }
}

// ── Connection task ─────────────────────────────────────────────────

/// Drives one connection from handshake to close.
///
/// Exits when:
/// - The handshake fails or times out
/// - A close is requested or the transport handle is dropped
/// - The peer closes the connection or a stream error occurs
async fn connection_task(
    request: Request,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: TransportEvents,
    connect_timeout: Duration,
) {
    let id = events.connection_id();
    let uri = request.uri().clone();

    let mut stream: WsStream =
        match tokio::time::timeout(connect_timeout, tokio_tungstenite::connect_async(request)).await
        {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                warn!(connection_id = %id, uri = %uri, "websocket handshake failed: {e}");
                events.on_error(e.to_string());
                events.on_close(None);
                return;
            }
            Err(_) => {
                warn!(connection_id = %id, uri = %uri, "websocket handshake timed out");
                events.on_error(format!(
                    "connection attempt timed out after {connect_timeout:?}"
                ));
                events.on_close(None);
                return;
            }
        };

    info!(connection_id = %id, uri = %uri, "WebSocket connection established");
    events.on_open();

    loop {
        tokio::select! {
            // Branch 1: outgoing command from the transport handle
            command = commands.recv() => {
                match command {
                    Some(Command::Send(message)) => {
                        if let Err(e) = stream.send(message).await {
                            warn!(connection_id = %id, "websocket send error: {e}");
                            events.on_error(e.to_string());
                            events.on_close(None);
                            break;
                        }
                    }
                    // Explicit close, or the handle was dropped.
                    Some(Command::Close) | None => {
                        debug!(connection_id = %id, "closing websocket");
                        if let Err(e) = stream.close(None).await {
                            debug!(connection_id = %id, "close handshake failed: {e}");
                        }
                        events.on_close(None);
                        break;
                    }
                }
            }

            // Branch 2: incoming frame from the peer
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        events.on_message(Payload::Text(text.to_string()));
                    }
                    Some(Ok(Message::Binary(data))) => {
                        events.on_message(Payload::Binary(data.to_vec()));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(connection_id = %id, ?frame, "received WebSocket close frame");
                        events.on_close(frame.map(|f| f.reason.to_string()));
                        break;
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        // tungstenite queues the pong reply itself.
                    }
                    Some(Ok(Message::Frame(_))) => {
                        debug!(connection_id = %id, "received raw WebSocket frame, skipping");
                    }
                    Some(Err(e)) => {
                        warn!(connection_id = %id, "websocket receive error: {e}");
                        events.on_error(e.to_string());
                        events.on_close(None);
                        break;
                    }
                    None => {
                        debug!(connection_id = %id, "websocket stream ended");
                        events.on_close(None);
                        break;
                    }
                }
            }
        }
    }

    debug!(connection_id = %id, "connection task exited");
}

#[cfg(test)]
#[cfg(feature = "transport-websocket")]
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
    use crate::{ConnectionState, InboundEvent, PollingClient, TickSocketError};
    use tokio::net::TcpListener;

    #[test]
    fn websocket_transport_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<WebSocketTransport>();
    }

    #[test]
    fn config_defaults() {
        let config = WebSocketConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.runtime_thread_name, "tick-socket-io");
    }

    #[test]
    fn config_builder_methods() {
        let config = WebSocketConfig::new()
            .with_connect_timeout(Duration::from_millis(250))
            .with_runtime_thread_name("net");
        assert_eq!(config.connect_timeout, Duration::from_millis(250));
        assert_eq!(config.runtime_thread_name, "net");
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn client_on_current_runtime(config: WebSocketConfig) -> PollingClient<WebSocketConnector> {
        PollingClient::new(WebSocketConnector::from_handle(Handle::current(), config))
    }

    /// Start a local WebSocket server that runs `handler` on the accepted
    /// connection and returns the address to connect to.
    async fn start_mock_server<F, Fut>(handler: F) -> String
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            handler(ws).await;
        });

        format!("ws://{addr}")
    }

    /// Poll `client` once per millisecond-ish tick until `done` holds.
    async fn poll_until<C, F>(client: &mut PollingClient<C>, mut done: F)
    where
        C: Connector,
        F: FnMut(&mut PollingClient<C>) -> bool,
    {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !done(&mut *client) {
            assert!(
                tokio::time::Instant::now() < deadline,
                "condition not reached, state = {}",
                client.state()
            );
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    async fn next_event<C: Connector>(client: &mut PollingClient<C>) -> InboundEvent {
        let mut event = None;
        poll_until(client, |c| {
            event = c.try_recv();
            event.is_some()
        })
        .await;
        event.unwrap()
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn connect_fails_with_invalid_url() {
        let mut client = client_on_current_runtime(WebSocketConfig::default());
        let err = client.connect("not-a-valid-url").unwrap_err();
        assert!(matches!(err, TickSocketError::ConnectInit(_)));
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(client.try_recv().is_none());
    }

    #[tokio::test]
    async fn connect_rejects_http_scheme() {
        let mut client = client_on_current_runtime(WebSocketConfig::default());
        let err = client.connect("http://127.0.0.1:1/").unwrap_err();
        assert!(matches!(err, TickSocketError::ConnectInit(ref msg) if msg.contains("scheme")));
    }

    #[tokio::test]
    async fn unreachable_host_reports_error_then_closes() {
        let mut client = client_on_current_runtime(WebSocketConfig::default());
        client.connect("ws://127.0.0.1:1").unwrap();
        assert_eq!(client.state(), ConnectionState::Connecting);

        let event = next_event(&mut client).await;
        assert!(matches!(event, InboundEvent::TransportError { .. }));
        poll_until(&mut client, |c| c.state() == ConnectionState::Closed).await;
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn connect_timeout_reports_error() {
        // Non-routable address so the handshake never completes.
        let config = WebSocketConfig::new().with_connect_timeout(Duration::from_millis(50));
        let mut client = client_on_current_runtime(config);
        client.connect("ws://192.0.2.1:1").unwrap();

        // Some sandboxes reject the route outright instead of timing out;
        // either way exactly one error is reported before the close.
        let event = next_event(&mut client).await;
        match event {
            InboundEvent::TransportError { description } => assert!(!description.is_empty()),
            other => panic!("expected TransportError, got {other:?}"),
        }
        poll_until(&mut client, |c| c.state() == ConnectionState::Closed).await;
    }

    #[tokio::test]
    async fn receives_text_and_binary_in_order() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::text("ping")).await.unwrap();
            ws.send(Message::binary(vec![0x00, 0x10])).await.unwrap();
            ws.send(Message::text("pong")).await.unwrap();
            // Keep the connection open until the client goes away.
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let mut client = client_on_current_runtime(WebSocketConfig::default());
        client.connect(&url).unwrap();
        poll_until(&mut client, |c| c.is_connected()).await;

        let first = next_event(&mut client).await;
        assert!(first.is_text());
        assert_eq!(first.payload().unwrap().as_text(), Some("ping"));

        let second = next_event(&mut client).await;
        assert!(!second.is_text());
        assert_eq!(second.payload().unwrap().as_bytes(), &[0x00, 0x10]);

        let third = next_event(&mut client).await;
        assert_eq!(third.payload().unwrap().as_text(), Some("pong"));

        client.disconnect().unwrap();
    }

    #[tokio::test]
    async fn sends_reach_server_verbatim() {
        let (seen_tx, seen_rx) = oneshot::channel::<Vec<Message>>();
        let url = start_mock_server(|mut ws| async move {
            let mut seen = Vec::new();
            while seen.len() < 2 {
                match ws.next().await {
                    Some(Ok(msg @ (Message::Text(_) | Message::Binary(_)))) => seen.push(msg),
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
            let _ = seen_tx.send(seen);
        })
        .await;

        let mut client = client_on_current_runtime(WebSocketConfig::default());
        client.connect(&url).unwrap();
        poll_until(&mut client, |c| c.is_connected()).await;

        client.send_binary(&[0x01, 0x02, 0xFF]).unwrap();
        client.send_text("hello").unwrap();

        let seen = tokio::time::timeout(Duration::from_secs(5), seen_rx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(seen[0], Message::binary(vec![0x01, 0x02, 0xFF]));
        assert_eq!(seen[1], Message::text("hello"));
    }

    #[tokio::test]
    async fn server_close_moves_to_closed() {
        let url = start_mock_server(|mut ws| async move {
            ws.close(None).await.unwrap();
        })
        .await;

        let mut client = client_on_current_runtime(WebSocketConfig::default());
        client.connect(&url).unwrap();
        poll_until(&mut client, |c| c.state() == ConnectionState::Closed).await;
        assert!(matches!(
            client.send_text("late"),
            Err(TickSocketError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn disconnect_sends_close_to_server() {
        let (url, closed_rx) = start_close_watching_server().await;

        let mut client = client_on_current_runtime(WebSocketConfig::default());
        client.connect(&url).unwrap();
        poll_until(&mut client, |c| c.is_connected()).await;

        client.disconnect().unwrap();
        assert_eq!(client.state(), ConnectionState::Closed);

        let saw_close = tokio::time::timeout(Duration::from_secs(5), closed_rx)
            .await
            .unwrap()
            .unwrap();
        assert!(saw_close);
    }

    /// Server that reports whether it saw a close frame before the stream ended.
    async fn start_close_watching_server() -> (String, oneshot::Receiver<bool>) {
        let (closed_tx, closed_rx) = oneshot::channel::<bool>();
        let url = start_mock_server(|mut ws| async move {
            let mut saw_close = false;
            while let Some(Ok(msg)) = ws.next().await {
                if msg.is_close() {
                    saw_close = true;
                }
            }
            let _ = closed_tx.send(saw_close);
        })
        .await;
        (url, closed_rx)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn background_runtime_sends_close_when_dropped_after_disconnect() {
        let (url, closed_rx) = start_close_watching_server().await;

        let mut client = PollingClient::websocket().unwrap();
        client.connect(&url).unwrap();
        poll_until(&mut client, |c| c.is_connected()).await;

        client.disconnect().unwrap();
        drop(client);

        let saw_close = tokio::time::timeout(Duration::from_secs(5), closed_rx)
            .await
            .unwrap()
            .unwrap();
        assert!(saw_close);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn background_runtime_sends_close_when_dropped_while_connected() {
        let (url, closed_rx) = start_close_watching_server().await;

        let mut client = PollingClient::websocket().unwrap();
        client.connect(&url).unwrap();
        poll_until(&mut client, |c| c.is_connected()).await;

        drop(client);

        let saw_close = tokio::time::timeout(Duration::from_secs(5), closed_rx)
            .await
            .unwrap()
            .unwrap();
        assert!(saw_close);
    }

    #[tokio::test]
    async fn background_runtime_connector_round_trip() {
        let url = start_mock_server(|mut ws| async move {
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                ws.send(Message::Text(text)).await.unwrap();
            }
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let mut client = PollingClient::websocket().unwrap();
        client.connect(&url).unwrap();
        poll_until(&mut client, |c| c.is_connected()).await;

        client.send_text("echo").unwrap();
        let event = next_event(&mut client).await;
        assert_eq!(event.payload().unwrap().as_text(), Some("echo"));

        client.disconnect().unwrap();
    }
}
