//! WebSocket listener.
//!
//! Turns inbound HTTP upgrade requests into [`Connection`]s queued for an
//! accept loop.
//!
//! # Connection Flow
//!
//! 1. The HTTP front end hands each inbound stream to
//!    [`WebSocketListener::handle_upgrade`] (or [`WebSocketListener::serve`]
//!    does so for a [`TcpListener`])
//! 2. The upgrade is performed with the listener's [`AcceptOptions`]
//! 3. The resulting connection waits for a slot in the bounded accept queue
//! 4. [`WebSocketListener::accept`] hands it to the caller
//!
//! A connection that cannot be queued before the listener or the request is
//! cancelled is closed with status 1014 (bad gateway). Connections still
//! queued when the listener closes are closed by a background drain task.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::result::Result as StdResult;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio_tungstenite::accept_hdr_async_with_config;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode, header};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::net::{Listener, UpgradeHandler, WEBSOCKET_NETWORK, WsAddr};

use super::Connection;

// ============================================================================
// Constants
// ============================================================================

/// Default number of accepted connections waiting for `accept`.
pub const DEFAULT_QUEUE_CAPACITY: usize = 8;

/// Close status for connections that lost the race to the accept queue.
const BAD_GATEWAY: u16 = 1014;

/// Reason reported once the listener's scope is cancelled.
const SHUTDOWN_REASON: &str = "context canceled";

/// First pause after a failed TCP accept.
const MIN_ACCEPT_BACKOFF: Duration = Duration::from_millis(5);

/// Longest pause between failed TCP accepts.
const MAX_ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

// ============================================================================
// AcceptOptions
// ============================================================================

/// Accept-time configuration of a [`WebSocketListener`].
#[derive(Debug, Clone)]
pub struct AcceptOptions {
    /// Engine configuration (message and frame limits).
    pub config: Option<WebSocketConfig>,

    /// Supported subprotocols, in order of preference.
    pub subprotocols: Vec<String>,

    /// Only upgrade requests for this path are accepted.
    pub path: Option<String>,

    /// Capacity of the accept queue.
    pub queue_capacity: usize,
}

impl Default for AcceptOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl AcceptOptions {
    /// Creates options accepting any path with an 8-slot queue.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            config: None,
            subprotocols: Vec::new(),
            path: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Sets the engine configuration.
    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: WebSocketConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Adds a supported subprotocol.
    #[inline]
    #[must_use]
    pub fn with_subprotocol(mut self, protocol: impl Into<String>) -> Self {
        self.subprotocols.push(protocol.into());
        self
    }

    /// Restricts upgrades to `path`; other paths get `404 Not Found`.
    #[inline]
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the accept queue capacity (at least 1).
    #[inline]
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Checks the request route and picks a subprotocol.
    fn negotiate(
        &self,
        request: &Request,
        mut response: Response,
    ) -> StdResult<Response, ErrorResponse> {
        if let Some(path) = &self.path
            && request.uri().path() != path
        {
            return Err(error_response(StatusCode::NOT_FOUND, "404: Not Found"));
        }

        if let Some(protocol) = self.select_subprotocol(request)
            && let Ok(value) = HeaderValue::from_str(protocol)
        {
            response
                .headers_mut()
                .insert(header::SEC_WEBSOCKET_PROTOCOL, value);
        }

        Ok(response)
    }

    /// First client-offered subprotocol that is also supported.
    fn select_subprotocol<'r>(&self, request: &'r Request) -> Option<&'r str> {
        request
            .headers()
            .get_all(header::SEC_WEBSOCKET_PROTOCOL)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .find(|offered| self.subprotocols.iter().any(|supported| supported == offered))
    }
}

// ============================================================================
// WebSocketListener
// ============================================================================

/// State shared by all handles of one listener.
struct Shared<S> {
    lifecycle: CancellationToken,
    accept_tx: mpsc::Sender<Connection<S>>,
    accept_rx: Arc<AsyncMutex<mpsc::Receiver<Connection<S>>>>,
    options: AcceptOptions,
}

impl<S> Drop for Shared<S> {
    fn drop(&mut self) {
        self.lifecycle.cancel();
    }
}

/// A listener producing websocket [`Connection`]s.
///
/// Cloning yields another handle to the same listener. The listener closes
/// when [`WebSocketListener::close`] is called, when its governing scope is
/// cancelled, or when the last handle is dropped. Accepted connections are
/// bound to the listener and close with it.
///
/// # Example
///
/// ```ignore
/// use tokio::net::TcpListener;
/// use tokio_util::sync::CancellationToken;
/// use wsnet::WebSocketListener;
///
/// let listener: WebSocketListener = WebSocketListener::new(&CancellationToken::new());
/// let tcp = TcpListener::bind("127.0.0.1:8080").await?;
/// tokio::spawn({
///     let listener = listener.clone();
///     async move { listener.serve(tcp).await }
/// });
///
/// loop {
///     let conn = listener.accept().await?;
///     // ...
/// }
/// ```
pub struct WebSocketListener<S = TcpStream> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for WebSocketListener<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

// ============================================================================
// WebSocketListener - Core
// ============================================================================

impl<S> WebSocketListener<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Creates a listener living as long as `scope`.
    ///
    /// Spawns the queue drain task; must be called from within a tokio
    /// runtime.
    #[must_use]
    pub fn new(scope: &CancellationToken) -> Self {
        Self::with_options(scope, AcceptOptions::default())
    }

    /// Creates a listener with explicit accept options.
    #[must_use]
    pub fn with_options(scope: &CancellationToken, options: AcceptOptions) -> Self {
        let lifecycle = scope.child_token();
        let (accept_tx, accept_rx) = mpsc::channel(options.queue_capacity.max(1));
        let accept_rx = Arc::new(AsyncMutex::new(accept_rx));

        tokio::spawn(Self::run_drain(lifecycle.clone(), Arc::clone(&accept_rx)));

        Self {
            shared: Arc::new(Shared {
                lifecycle,
                accept_tx,
                accept_rx,
                options,
            }),
        }
    }

    /// Upgrades one inbound HTTP request and queues the connection.
    ///
    /// `stream` must be positioned at the start of the HTTP request.
    /// Returns once the connection is queued or refused; failures are
    /// logged and never reach [`WebSocketListener::accept`].
    pub async fn handle_upgrade(&self, stream: S, request: &CancellationToken) {
        let shared = &*self.shared;
        let lifecycle = &shared.lifecycle;
        let mut session_url = None;

        let callback = |req: &Request, response: Response| -> StdResult<Response, ErrorResponse> {
            if lifecycle.is_cancelled() {
                warn!(uri = %req.uri(), "WebSocket upgrade requested after listener shutdown");
                return Err(error_response(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "503: Service is shutdown",
                ));
            }

            let response = shared.options.negotiate(req, response)?;
            session_url = Some(session_url_of(req));
            Ok(response)
        };

        let ws_stream = match accept_hdr_async_with_config(stream, callback, shared.options.config)
            .await
        {
            Ok(ws_stream) => ws_stream,
            Err(e) => {
                if lifecycle.is_cancelled() {
                    debug!(error = %e, "WebSocket upgrade refused after shutdown");
                } else {
                    error!(error = %e, "Could not accept websocket");
                }
                return;
            }
        };

        let url = session_url.unwrap_or_else(|| WEBSOCKET_NETWORK.to_owned());
        let conn = Connection::from_stream(ws_stream, url, lifecycle.child_token());

        tokio::select! {
            biased;

            _ = lifecycle.cancelled() => {
                debug!(url = conn.url(), "Listener closed before connection was queued");
                conn.close_with(
                    BAD_GATEWAY,
                    format!(
                        "Failed to accept connection before websocket listener shutdown; Details: {SHUTDOWN_REASON}"
                    ),
                );
            }

            _ = request.cancelled() => {
                debug!(url = conn.url(), "Request cancelled before connection was queued");
                conn.close_with(
                    BAD_GATEWAY,
                    "Failed to accept connection before websocket HTTP request cancellation",
                );
            }

            permit = shared.accept_tx.reserve() => match permit {
                Ok(permit) => {
                    trace!(url = conn.url(), "WebSocket connection queued");
                    permit.send(conn);
                }
                Err(_) => {
                    conn.close_with(BAD_GATEWAY, "Accept queue closed");
                }
            },
        }
    }

    /// Waits for the next queued connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ListenerClosed`] once the listener is closed.
    pub async fn accept(&self) -> Result<Connection<S>> {
        let lifecycle = &self.shared.lifecycle;

        let mut accept_rx = tokio::select! {
            biased;

            _ = lifecycle.cancelled() => return Err(Error::listener_closed(SHUTDOWN_REASON)),

            accept_rx = self.shared.accept_rx.lock() => accept_rx,
        };

        tokio::select! {
            biased;

            _ = lifecycle.cancelled() => Err(Error::listener_closed(SHUTDOWN_REASON)),

            conn = accept_rx.recv() => conn.ok_or_else(|| Error::listener_closed(SHUTDOWN_REASON)),
        }
    }

    /// Closes the listener and every connection still queued.
    ///
    /// Idempotent; returns immediately.
    pub fn close(&self) {
        debug!("WebSocket listener close requested");
        self.shared.lifecycle.cancel();
    }

    /// Returns `true` once the listener is closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.lifecycle.is_cancelled()
    }

    /// Returns the accept options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &AcceptOptions {
        &self.shared.options
    }

    /// Closes queued connections after shutdown.
    async fn run_drain(
        lifecycle: CancellationToken,
        accept_rx: Arc<AsyncMutex<mpsc::Receiver<Connection<S>>>>,
    ) {
        lifecycle.cancelled().await;

        let mut accept_rx = accept_rx.lock().await;
        accept_rx.close();

        let mut drained = 0usize;
        while let Some(conn) = accept_rx.recv().await {
            conn.close();
            drained += 1;
        }

        debug!(drained, "WebSocket listener shut down");
    }
}

// ============================================================================
// WebSocketListener - TCP
// ============================================================================

impl WebSocketListener<TcpStream> {
    /// Runs an accept loop on `tcp_listener` until the listener closes.
    ///
    /// Every inbound TCP stream is upgraded on its own task. A failed TCP
    /// accept (file descriptor exhaustion, aborted handshake) is logged and
    /// retried after a growing pause of up to one second.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if `tcp_listener` has no usable local address.
    pub async fn serve(&self, tcp_listener: TcpListener) -> Result<()> {
        let lifecycle = &self.shared.lifecycle;
        let local_addr = tcp_listener.local_addr()?;

        info!(addr = %local_addr, "WebSocket listener serving");

        let mut backoff = None;

        loop {
            let accepted = tokio::select! {
                biased;

                _ = lifecycle.cancelled() => {
                    debug!("WebSocket listener stopped serving");
                    return Ok(());
                }

                accepted = tcp_listener.accept() => accepted,
            };

            let (stream, peer) = match accepted {
                Ok(accepted) => {
                    backoff = None;
                    accepted
                }
                Err(e) => {
                    let delay = next_backoff(backoff);
                    backoff = Some(delay);
                    warn!(error = %e, retry_in = ?delay, "TCP accept failed");

                    tokio::select! {
                        biased;

                        _ = lifecycle.cancelled() => {}

                        _ = tokio::time::sleep(delay) => {}
                    }
                    continue;
                }
            };

            if let Err(e) = stream.set_nodelay(true) {
                debug!(?peer, error = %e, "Failed to set TCP_NODELAY");
            }

            trace!(?peer, "TCP connection accepted");

            let listener = self.clone();
            let request = lifecycle.child_token();
            tokio::spawn(async move {
                listener.handle_upgrade(stream, &request).await;
            });
        }
    }
}

// ============================================================================
// Trait Implementations
// ============================================================================

#[async_trait]
impl<S> Listener for WebSocketListener<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Conn = Connection<S>;
    type Address = WsAddr;

    async fn accept(&self) -> Result<Connection<S>> {
        WebSocketListener::accept(self).await
    }

    fn close(&self) -> Result<()> {
        WebSocketListener::close(self);
        Ok(())
    }

    fn addr(&self) -> WsAddr {
        WsAddr::new(WEBSOCKET_NETWORK)
    }
}

#[async_trait]
impl<S> UpgradeHandler<S> for WebSocketListener<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn handle_upgrade(&self, stream: S, request: &CancellationToken) {
        WebSocketListener::handle_upgrade(self, stream, request).await;
    }
}

impl<S> fmt::Debug for WebSocketListener<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketListener")
            .field("options", &self.shared.options)
            .field("closed", &self.shared.lifecycle.is_cancelled())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Pause before retrying a failed TCP accept: 5 ms, doubling up to 1 s.
fn next_backoff(previous: Option<Duration>) -> Duration {
    previous.map_or(MIN_ACCEPT_BACKOFF, |delay| (delay * 2).min(MAX_ACCEPT_BACKOFF))
}

/// Builds a plain-text HTTP error response.
fn error_response(status: StatusCode, body: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(body.to_owned()));
    *response.status_mut() = status;
    response
}

/// Session URL of an accepted connection: `ws://{Host}{path}`.
fn session_url_of(request: &Request) -> String {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok());

    let path = request
        .uri()
        .path_and_query()
        .map_or("/", |path| path.as_str());

    match host {
        Some(host) => format!("ws://{host}{path}"),
        None => WEBSOCKET_NETWORK.to_owned(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use futures_util::{SinkExt, StreamExt};
    use tokio::io::{AsyncWriteExt, DuplexStream};
    use tokio::task::JoinHandle;
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;
    use tokio_tungstenite::tungstenite::{Error as WsError, Message};
    use tokio_tungstenite::{WebSocketStream, client_async};

    use crate::net::Addr;

    const WAIT: Duration = Duration::from_secs(5);
    const SHORT: Duration = Duration::from_millis(50);

    type Client = WebSocketStream<DuplexStream>;

    /// Starts an upgrade on `listener` over an in-memory pipe.
    fn start_upgrade(
        listener: &WebSocketListener<DuplexStream>,
        request: CancellationToken,
    ) -> (DuplexStream, JoinHandle<()>) {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let listener = listener.clone();
        let handler = tokio::spawn(async move {
            listener.handle_upgrade(server_io, &request).await;
        });
        (client_io, handler)
    }

    /// Completes a client handshake against `listener`.
    async fn connect(
        listener: &WebSocketListener<DuplexStream>,
        request: CancellationToken,
        url: &str,
    ) -> (Client, JoinHandle<()>) {
        let (client_io, handler) = start_upgrade(listener, request);
        let (client, _response) = timeout(WAIT, client_async(url, client_io))
            .await
            .expect("handshake should not hang")
            .expect("handshake should succeed");
        (client, handler)
    }

    async fn next_close_code(client: &mut Client) -> u16 {
        loop {
            let message = timeout(WAIT, client.next())
                .await
                .expect("client should receive a message")
                .expect("client stream should not end")
                .expect("client read should succeed");
            if let Message::Close(frame) = message {
                return frame.map_or(1005, |frame| u16::from(frame.code));
            }
        }
    }

    #[tokio::test]
    async fn test_accept_returns_upgraded_connection() {
        let listener: WebSocketListener<DuplexStream> =
            WebSocketListener::new(&CancellationToken::new());
        let (mut client, handler) =
            connect(&listener, CancellationToken::new(), "ws://example/tunnel").await;
        handler.await.unwrap();

        let conn = timeout(WAIT, listener.accept())
            .await
            .expect("accept should not hang")
            .expect("accept should succeed");
        assert_eq!(conn.url(), "ws://example/tunnel");

        client.send(Message::binary(b"hi".to_vec())).await.unwrap();
        let mut buf = [0u8; 8];
        let n = conn.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hi");

        conn.write(b"yo").await.unwrap();
        let reply = timeout(WAIT, client.next()).await.unwrap().unwrap().unwrap();
        assert_eq!(reply, Message::binary(b"yo".to_vec()));
    }

    #[tokio::test]
    async fn test_full_queue_applies_backpressure() {
        let options = AcceptOptions::new().with_queue_capacity(1);
        let listener: WebSocketListener<DuplexStream> =
            WebSocketListener::with_options(&CancellationToken::new(), options);

        let (_first, first_handler) =
            connect(&listener, CancellationToken::new(), "ws://example/first").await;
        first_handler.await.unwrap();

        let request = CancellationToken::new();
        let (mut second, second_handler) =
            connect(&listener, request.clone(), "ws://example/second").await;

        // Queue is full: the second handler waits for a slot.
        tokio::time::sleep(SHORT).await;
        assert!(!second_handler.is_finished());

        request.cancel();
        timeout(WAIT, second_handler).await.unwrap().unwrap();
        assert_eq!(next_close_code(&mut second).await, 1014);

        let conn = listener.accept().await.unwrap();
        assert_eq!(conn.url(), "ws://example/first");

        // The refused connection never shows up.
        assert!(timeout(SHORT, listener.accept()).await.is_err());
    }

    #[tokio::test]
    async fn test_accept_frees_slot_for_waiting_upgrade() {
        let options = AcceptOptions::new().with_queue_capacity(1);
        let listener: WebSocketListener<DuplexStream> =
            WebSocketListener::with_options(&CancellationToken::new(), options);

        let (_first, _) = connect(&listener, CancellationToken::new(), "ws://example/1").await;
        let (_second, second_handler) =
            connect(&listener, CancellationToken::new(), "ws://example/2").await;

        let first = listener.accept().await.unwrap();
        timeout(WAIT, second_handler).await.unwrap().unwrap();
        let second = listener.accept().await.unwrap();

        assert_eq!(first.url(), "ws://example/1");
        assert_eq!(second.url(), "ws://example/2");
    }

    #[tokio::test]
    async fn test_close_drains_queued_connections() {
        let listener: WebSocketListener<DuplexStream> =
            WebSocketListener::new(&CancellationToken::new());

        let (mut first, h1) = connect(&listener, CancellationToken::new(), "ws://example/a").await;
        let (mut second, h2) = connect(&listener, CancellationToken::new(), "ws://example/b").await;
        h1.await.unwrap();
        h2.await.unwrap();

        listener.close();

        assert_eq!(next_close_code(&mut first).await, 1000);
        assert_eq!(next_close_code(&mut second).await, 1000);

        let err = listener.accept().await.unwrap_err();
        assert!(matches!(err, Error::ListenerClosed { .. }));
    }

    #[tokio::test]
    async fn test_upgrade_after_close_is_service_unavailable() {
        let listener: WebSocketListener<DuplexStream> =
            WebSocketListener::new(&CancellationToken::new());
        listener.close();

        let (client_io, handler) = start_upgrade(&listener, CancellationToken::new());
        let err = client_async("ws://example/late", client_io)
            .await
            .expect_err("handshake should be refused");

        match err {
            WsError::Http(response) => {
                assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        timeout(WAIT, handler).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_parent_scope_closes_listener() {
        let scope = CancellationToken::new();
        let listener: WebSocketListener<DuplexStream> = WebSocketListener::new(&scope);

        let pending = tokio::spawn({
            let listener = listener.clone();
            async move { listener.accept().await }
        });
        tokio::time::sleep(SHORT).await;

        scope.cancel();

        let result = timeout(WAIT, pending).await.unwrap().unwrap();
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "Listener closed; Details: context canceled");
        assert!(listener.is_closed());
    }

    #[tokio::test]
    async fn test_listener_close_closes_accepted_connections() {
        let listener: WebSocketListener<DuplexStream> =
            WebSocketListener::new(&CancellationToken::new());
        let (mut client, handler) =
            connect(&listener, CancellationToken::new(), "ws://example/tunnel").await;
        handler.await.unwrap();
        let conn = listener.accept().await.unwrap();

        listener.close();

        assert!(conn.is_closed());
        assert_eq!(next_close_code(&mut client).await, 1000);
    }

    #[tokio::test]
    async fn test_failed_upgrade_is_invisible() {
        let listener: WebSocketListener<DuplexStream> =
            WebSocketListener::new(&CancellationToken::new());
        let (mut client_io, handler) = start_upgrade(&listener, CancellationToken::new());

        client_io
            .write_all(b"GET / HTTP/1.1\r\nHost: example\r\n\r\n")
            .await
            .unwrap();

        timeout(WAIT, handler).await.unwrap().unwrap();
        assert!(timeout(SHORT, listener.accept()).await.is_err());
    }

    #[tokio::test]
    async fn test_path_mismatch_is_not_found() {
        let options = AcceptOptions::new().with_path("/tunnel");
        let listener: WebSocketListener<DuplexStream> =
            WebSocketListener::with_options(&CancellationToken::new(), options);

        let (client_io, handler) = start_upgrade(&listener, CancellationToken::new());
        let err = client_async("ws://example/other", client_io)
            .await
            .expect_err("wrong path should be refused");

        match err {
            WsError::Http(response) => assert_eq!(response.status(), StatusCode::NOT_FOUND),
            other => panic!("unexpected error: {other:?}"),
        }
        timeout(WAIT, handler).await.unwrap().unwrap();
        assert!(timeout(SHORT, listener.accept()).await.is_err());
    }

    #[tokio::test]
    async fn test_subprotocol_negotiation() {
        let options = AcceptOptions::new()
            .with_subprotocol("chat")
            .with_subprotocol("grpc");
        let listener: WebSocketListener<DuplexStream> =
            WebSocketListener::with_options(&CancellationToken::new(), options);

        let mut request = "ws://example/tunnel".into_client_request().unwrap();
        request.headers_mut().insert(
            header::SEC_WEBSOCKET_PROTOCOL,
            HeaderValue::from_static("grpc"),
        );

        let (client_io, _handler) = start_upgrade(&listener, CancellationToken::new());
        let (_client, response) = client_async(request, client_io).await.unwrap();

        assert_eq!(response.headers()[header::SEC_WEBSOCKET_PROTOCOL], "grpc");
    }

    #[tokio::test]
    async fn test_addr_is_websocket_literal() {
        let listener: WebSocketListener<DuplexStream> =
            WebSocketListener::new(&CancellationToken::new());

        let addr = Listener::addr(&listener);
        assert_eq!(addr.to_string(), "websocket");
        assert_eq!(addr.network(), "websocket");
    }

    #[tokio::test]
    async fn test_close_refuses_upgrade_waiting_for_slot() {
        let options = AcceptOptions::new().with_queue_capacity(1);
        let listener: WebSocketListener<DuplexStream> =
            WebSocketListener::with_options(&CancellationToken::new(), options);

        let (_first, first_handler) =
            connect(&listener, CancellationToken::new(), "ws://example/first").await;
        first_handler.await.unwrap();

        let (mut second, second_handler) =
            connect(&listener, CancellationToken::new(), "ws://example/second").await;
        tokio::time::sleep(SHORT).await;
        assert!(!second_handler.is_finished());

        listener.close();

        timeout(WAIT, second_handler).await.unwrap().unwrap();

        // The refusal races the connection's own shutdown.
        let code = next_close_code(&mut second).await;
        assert!(code == 1000 || code == 1014, "unexpected close code {code}");
        assert!(listener.accept().await.is_err());
    }

    #[test]
    fn test_accept_backoff_grows_to_cap() {
        let first = next_backoff(None);
        assert_eq!(first, Duration::from_millis(5));
        assert_eq!(next_backoff(Some(first)), Duration::from_millis(10));
        assert_eq!(next_backoff(Some(Duration::from_millis(800))), Duration::from_secs(1));
        assert_eq!(next_backoff(Some(Duration::from_secs(1))), Duration::from_secs(1));
    }

    #[test]
    fn test_accept_options_defaults() {
        let options = AcceptOptions::default();
        assert_eq!(options.queue_capacity, 8);
        assert!(options.path.is_none());
        assert_eq!(AcceptOptions::new().with_queue_capacity(0).queue_capacity, 1);
    }
}
