//! wsnet - Byte-stream connections tunneled over WebSockets.
//!
//! This library lets stream-oriented code (RPC frameworks, custom protocols)
//! run over a websocket without knowing that messages are involved.
//!
//! # Architecture
//!
//! The library follows a dialer/listener model:
//!
//! - **Client side**: [`Dialer`] opens a websocket and returns a [`Connection`]
//! - **Server side**: [`WebSocketListener`] upgrades inbound HTTP requests and
//!   queues the resulting connections for [`WebSocketListener::accept`]
//!
//! Key design principles:
//!
//! - Every write becomes exactly one binary websocket message
//! - Reads return bytes from one message at a time, never spanning two
//! - Text and control messages are invisible to the byte stream
//! - Every connection and listener lives within a [`CancellationToken`] scope
//!
//! # Quick Start
//!
//! ```no_run
//! use tokio::net::TcpListener;
//! use tokio_util::sync::CancellationToken;
//! use wsnet::{Result, WebSocketListener, dial};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let scope = CancellationToken::new();
//!     let listener: WebSocketListener = WebSocketListener::new(&scope);
//!
//!     let tcp = TcpListener::bind("127.0.0.1:8080").await?;
//!     tokio::spawn({
//!         let listener = listener.clone();
//!         async move { listener.serve(tcp).await }
//!     });
//!
//!     let client = dial("websocket", "ws://127.0.0.1:8080/tunnel").await?;
//!     let server = listener.accept().await?;
//!
//!     client.write(b"ping").await?;
//!     let mut buf = [0u8; 16];
//!     let n = server.read(&mut buf).await?;
//!     assert_eq!(&buf[..n], b"ping");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`dial`] | [`Dialer`] and dial options |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`net`] | [`Conn`], [`Listener`] and [`Addr`] contracts |
//! | [`transport`] | [`Connection`] and [`WebSocketListener`] |
//!
//! # Features
//!
//! - **`tls`**: enables `wss://` dialing through rustls
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

// ============================================================================
// Modules
// ============================================================================

/// Client side: dialing websocket connections.
///
/// Use [`Dialer::new()`] or the [`dial()`] shortcut.
pub mod dial;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Byte-stream capability traits and the address stub.
pub mod net;

/// WebSocket transport layer.
///
/// Connection adapter and listener adapter.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Dial types
pub use dial::{
    DialOption, DialOptions, Dialer, HttpClient, dial, dial_context, grpc_dialer, with_http_client,
};

// Error types
pub use error::{Error, Result};

// Contracts
pub use net::{Addr, Conn, Listener, UpgradeHandler, WEBSOCKET_NETWORK, WsAddr};

// Transport types
pub use transport::{AcceptOptions, Connection, DialedStream, WebSocketListener};
