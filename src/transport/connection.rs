//! WebSocket connection adapter.
//!
//! Presents one websocket as a byte stream. Every [`Connection::write`] is
//! sent as exactly one binary message; [`Connection::read`] hands out the
//! bytes of inbound binary messages in order, splitting a message across as
//! many reads as the caller's buffers require.
//!
//! # Shutdown
//!
//! Each connection owns a [`CancellationToken`]. Construction spawns one
//! watcher task that waits for the token, sends the close frame and runs the
//! registered cleanup actions. [`Connection::close`] only cancels the token,
//! so it never blocks on the network.
//!
//! # Message Mapping
//!
//! | Inbound message | Effect on the byte stream |
//! |-----------------|---------------------------|
//! | `Binary` | bytes delivered in order |
//! | `Text` | discarded |
//! | `Ping` / `Pong` | skipped (answered by the engine) |
//! | `Close` | [`Error::PeerClosed`] |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Bytes, Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_with_config};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::dial::DialOptions;
use crate::error::{Error, Result};
use crate::net::{Conn, WsAddr};

// ============================================================================
// Constants
// ============================================================================

/// Close reason sent on a plain [`Connection::close`].
const NORMAL_CLOSE_REASON: &str = "connection closed";

/// Status reported when the peer's close frame carries no code.
const NO_STATUS_RECEIVED: u16 = 1005;

/// Upper bound on sending the close frame during shutdown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Types
// ============================================================================

/// Transport of connections produced by [`crate::dial()`].
pub type DialedStream = MaybeTlsStream<TcpStream>;

/// Action run once after the close handshake.
type Cleanup = Box<dyn FnOnce() + Send>;

/// Read-side state, guarded by the read lock.
struct ReadState<S> {
    stream: SplitStream<WebSocketStream<S>>,
    /// Unread tail of the most recent binary message.
    remaining: Option<Bytes>,
}

/// State shared with the shutdown watcher.
struct Shared<S> {
    sink: AsyncMutex<SplitSink<WebSocketStream<S>, Message>>,
    close_frame: Mutex<Option<CloseFrame>>,
    /// `None` once the cleanup actions have run.
    cleanup: Mutex<Option<Vec<Cleanup>>>,
}

// ============================================================================
// Connection
// ============================================================================

/// A websocket presented as a byte stream.
///
/// Reads are serialized by an internal lock; writes are serialized
/// separately and never wait on a pending read.
///
/// Dropping the connection closes it.
pub struct Connection<S = DialedStream> {
    /// Session URL, reported as both local and remote address.
    url: String,
    /// Cancelled exactly once, by close, drop or a parent scope.
    lifecycle: CancellationToken,
    reader: AsyncMutex<ReadState<S>>,
    shared: Arc<Shared<S>>,
}

// ============================================================================
// Connection - Dialing
// ============================================================================

impl Connection<DialedStream> {
    /// Performs the opening handshake against `url` and wraps the result.
    ///
    /// The URL scheme is not validated here; see [`crate::Dialer`].
    /// `dial_scope` bounds the handshake only: cancelling it afterwards
    /// does not affect the connection.
    ///
    /// # Errors
    ///
    /// - [`Error::Cancelled`] if `dial_scope` fires during the handshake
    /// - [`Error::HandshakeTimeout`] if the HTTP client timeout elapses
    /// - [`Error::Config`] if a configured request header is invalid
    /// - [`Error::WebSocket`] if the engine rejects the handshake
    pub async fn connect(
        dial_scope: &CancellationToken,
        url: &str,
        options: &DialOptions,
    ) -> Result<Self> {
        let client = &options.http_client;
        let request = client.build_request(url)?;
        let handshake = connect_async_with_config(request, client.config, client.nodelay);

        let (ws_stream, response) = tokio::select! {
            biased;

            _ = dial_scope.cancelled() => {
                return Err(Error::cancelled("WebSocket dial"));
            }

            result = timeout(client.timeout, handshake) => {
                result.map_err(|_| Error::handshake_timeout(millis(client.timeout)))??
            }
        };

        debug!(url, status = %response.status(), "WebSocket handshake completed");

        Ok(Self::from_stream(ws_stream, url, CancellationToken::new()))
    }
}

// ============================================================================
// Connection - Core
// ============================================================================

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wraps an established websocket.
    ///
    /// The connection closes when `lifecycle` is cancelled, so passing a
    /// child token ties the connection to a wider scope. Spawns the shutdown
    /// watcher; must be called from within a tokio runtime.
    pub fn from_stream(
        ws_stream: WebSocketStream<S>,
        url: impl Into<String>,
        lifecycle: CancellationToken,
    ) -> Self {
        let url = url.into();
        let (sink, stream) = ws_stream.split();

        let shared = Arc::new(Shared {
            sink: AsyncMutex::new(sink),
            close_frame: Mutex::new(None),
            cleanup: Mutex::new(Some(Vec::with_capacity(3))),
        });

        tokio::spawn(Self::run_shutdown(
            lifecycle.clone(),
            Arc::clone(&shared),
            url.clone(),
        ));

        Self {
            url,
            lifecycle,
            reader: AsyncMutex::new(ReadState {
                stream,
                remaining: None,
            }),
            shared,
        }
    }

    /// Sends `buf` as a single binary message.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the connection was closed
    /// - [`Error::WebSocket`] if the engine fails to send
    pub async fn write(&self, buf: &[u8]) -> Result<usize> {
        if self.lifecycle.is_cancelled() {
            return Err(Error::ConnectionClosed);
        }

        let mut sink = tokio::select! {
            biased;

            _ = self.lifecycle.cancelled() => return Err(Error::ConnectionClosed),

            sink = self.shared.sink.lock() => sink,
        };

        // Cancellation aborts a send stalled on a peer that stopped reading.
        tokio::select! {
            biased;

            _ = self.lifecycle.cancelled() => return Err(Error::ConnectionClosed),

            sent = sink.send(Message::binary(buf.to_vec())) => sent?,
        }

        trace!(url = %self.url, len = buf.len(), "WebSocket message sent");
        Ok(buf.len())
    }

    /// Reads bytes from the current message into `buf`.
    ///
    /// Waits for the next binary message when nothing is buffered. A message
    /// larger than `buf` is handed out over several calls; bytes of two
    /// messages are never returned by the same call.
    ///
    /// Returns `Ok(0)` only for an empty `buf`.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the connection is or becomes closed
    /// - [`Error::PeerClosed`] if the peer sent a close frame
    /// - [`Error::WebSocket`] if the engine fails
    pub async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut reader = self.reader.lock().await;

        if self.lifecycle.is_cancelled() {
            return Err(Error::ConnectionClosed);
        }

        loop {
            let mut chunk = match reader.remaining.take() {
                Some(chunk) => chunk,
                None => Self::next_payload(&self.lifecycle, &mut reader.stream).await?,
            };

            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk.split_to(n));

            if chunk.is_empty() {
                // Exhausted with nothing copied: the message was empty.
                if n == 0 {
                    continue;
                }
            } else {
                reader.remaining = Some(chunk);
            }

            trace!(url = %self.url, n, "WebSocket read");
            return Ok(n);
        }
    }

    /// Closes the connection.
    ///
    /// Idempotent. The close frame (normal closure) is sent by a background
    /// task; this call returns immediately.
    pub fn close(&self) {
        debug!(url = %self.url, "WebSocket close requested");
        self.lifecycle.cancel();
    }

    /// Closes the connection with an explicit close status.
    ///
    /// The first recorded status is used, provided the close frame has not
    /// been sent yet; otherwise this is a plain close.
    pub fn close_with(&self, code: impl Into<CloseCode>, reason: impl Into<String>) {
        {
            let mut frame = self.shared.close_frame.lock();
            if frame.is_none() {
                *frame = Some(CloseFrame {
                    code: code.into(),
                    reason: reason.into().into(),
                });
            }
        }
        self.lifecycle.cancel();
    }

    /// Registers an action to run once the connection has shut down.
    ///
    /// Actions run in registration order. If shutdown already finished,
    /// `action` runs immediately.
    pub fn on_close(&self, action: impl FnOnce() + Send + 'static) {
        let mut cleanup = self.shared.cleanup.lock();
        match cleanup.as_mut() {
            Some(actions) => actions.push(Box::new(action)),
            None => {
                drop(cleanup);
                action();
            }
        }
    }

    /// Returns `true` once close was requested.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lifecycle.is_cancelled()
    }

    /// Returns the session URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Pulls messages until a binary payload arrives.
    async fn next_payload(
        lifecycle: &CancellationToken,
        stream: &mut SplitStream<WebSocketStream<S>>,
    ) -> Result<Bytes> {
        loop {
            let message = tokio::select! {
                biased;

                _ = lifecycle.cancelled() => return Err(Error::ConnectionClosed),

                message = stream.next() => message,
            };

            match message {
                Some(Ok(Message::Binary(payload))) => return Ok(payload),

                Some(Ok(Message::Text(text))) => {
                    trace!(len = text.len(), "Discarding text message");
                }

                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|frame| (u16::from(frame.code), frame.reason.as_str().to_owned()))
                        .unwrap_or((NO_STATUS_RECEIVED, String::new()));

                    debug!(code, reason = %reason, "WebSocket closed by remote");
                    return Err(Error::peer_closed(code, reason));
                }

                Some(Err(e)) => {
                    debug!(error = %e, "WebSocket read error");
                    return Err(e.into());
                }

                None => {
                    debug!("WebSocket stream ended");
                    return Err(WsError::ConnectionClosed.into());
                }

                // Ping, Pong, raw frames
                Some(Ok(_)) => {}
            }
        }
    }

    /// Waits for cancellation, then closes the websocket and runs cleanup.
    async fn run_shutdown(lifecycle: CancellationToken, shared: Arc<Shared<S>>, url: String) {
        lifecycle.cancelled().await;

        debug!(url = %url, "WebSocket shutdown");

        let frame = shared.close_frame.lock().take().unwrap_or_else(|| CloseFrame {
            code: CloseCode::Normal,
            reason: NORMAL_CLOSE_REASON.to_owned().into(),
        });

        let handshake = async {
            let mut sink = shared.sink.lock().await;

            if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                debug!(url = %url, error = %e, "Failed to send close frame");
            }

            if let Err(e) = sink.close().await {
                debug!(url = %url, error = %e, "Failed to close websocket");
            }
        };

        if timeout(CLOSE_TIMEOUT, handshake).await.is_err() {
            debug!(url = %url, "Close handshake timed out");
        }

        let actions = shared.cleanup.lock().take().unwrap_or_default();
        for action in actions {
            action();
        }

        trace!(url = %url, "WebSocket shutdown complete");
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Trait Implementations
// ============================================================================

#[async_trait]
impl<S> Conn for Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Address = WsAddr;

    async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        Connection::read(self, buf).await
    }

    async fn write(&self, buf: &[u8]) -> Result<usize> {
        Connection::write(self, buf).await
    }

    fn close(&self) -> Result<()> {
        Connection::close(self);
        Ok(())
    }

    fn local_addr(&self) -> WsAddr {
        WsAddr::new(self.url.as_str())
    }

    fn remote_addr(&self) -> WsAddr {
        WsAddr::new(self.url.as_str())
    }

    /// Accepted but not enforced.
    fn set_deadline(&self, _deadline: Option<Instant>) -> Result<()> {
        Ok(())
    }

    /// Accepted but not enforced.
    fn set_read_deadline(&self, _deadline: Option<Instant>) -> Result<()> {
        Ok(())
    }

    /// Accepted but not enforced.
    fn set_write_deadline(&self, _deadline: Option<Instant>) -> Result<()> {
        Ok(())
    }
}

impl<S> fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("url", &self.url)
            .field("closed", &self.lifecycle.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<S> Drop for Connection<S> {
    fn drop(&mut self) {
        self.lifecycle.cancel();
    }
}

// ============================================================================
// Tests
// ============================================================================
