//! Byte-stream capability traits.
//!
//! Code written against [`Conn`] and [`Listener`] does not care whether the
//! bytes travel over TCP or a websocket tunnel. [`Connection`] and
//! [`WebSocketListener`] are the websocket implementations.
//!
//! # Deadlines
//!
//! The deadline setters are part of the contract surface but websocket
//! connections accept them without enforcing anything. Use
//! [`Conn::close`] (or drop the connection) to interrupt a blocked peer.
//!
//! [`Connection`]: crate::Connection
//! [`WebSocketListener`]: crate::WebSocketListener

// ============================================================================
// Submodules
// ============================================================================

/// Address stub.
pub mod addr;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

pub use addr::{WEBSOCKET_NETWORK, WsAddr};

// ============================================================================
// Addr
// ============================================================================

/// A network endpoint address.
///
/// The [`Display`](fmt::Display) form is the address itself.
pub trait Addr: fmt::Display + fmt::Debug + Send + Sync {
    /// Name of the network family, e.g. `"websocket"`.
    fn network(&self) -> &str;
}

// ============================================================================
// Conn
// ============================================================================

/// A bidirectional byte stream.
#[async_trait]
pub trait Conn: Send + Sync {
    /// Address type reported by this connection.
    type Address: Addr;

    /// Reads at least one byte into `buf`, returning how many were read.
    ///
    /// Returns `Ok(0)` only when `buf` is empty.
    async fn read(&self, buf: &mut [u8]) -> Result<usize>;

    /// Writes all of `buf`, returning its length.
    async fn write(&self, buf: &[u8]) -> Result<usize>;

    /// Closes the connection. Never fails and never blocks on I/O.
    fn close(&self) -> Result<()>;

    /// Returns the local address.
    fn local_addr(&self) -> Self::Address;

    /// Returns the remote address.
    fn remote_addr(&self) -> Self::Address;

    /// Sets the read and write deadlines. `None` clears them.
    fn set_deadline(&self, deadline: Option<Instant>) -> Result<()>;

    /// Sets the read deadline. `None` clears it.
    fn set_read_deadline(&self, deadline: Option<Instant>) -> Result<()>;

    /// Sets the write deadline. `None` clears it.
    fn set_write_deadline(&self, deadline: Option<Instant>) -> Result<()>;
}

// ============================================================================
// Listener
// ============================================================================

/// A source of inbound [`Conn`]s.
#[async_trait]
pub trait Listener: Send + Sync {
    /// Connection type produced by [`Listener::accept`].
    type Conn: Conn;

    /// Address type reported by this listener.
    type Address: Addr;

    /// Waits for the next inbound connection.
    async fn accept(&self) -> Result<Self::Conn>;

    /// Stops accepting. Never fails.
    fn close(&self) -> Result<()>;

    /// Returns the listener address.
    fn addr(&self) -> Self::Address;
}

// ============================================================================
// UpgradeHandler
// ============================================================================

/// Turns an inbound HTTP upgrade request into a queued connection.
///
/// `request` is the request's own cancellation scope: when it fires before
/// the connection could be queued, the connection is refused.
#[async_trait]
pub trait UpgradeHandler<S: Send + 'static>: Send + Sync {
    /// Handles one inbound HTTP request carried on `stream`.
    async fn handle_upgrade(&self, stream: S, request: &CancellationToken);
}
