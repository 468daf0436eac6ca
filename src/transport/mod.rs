//! WebSocket transport layer.
//!
//! Adapts message-oriented websockets to the byte-stream [`Conn`] and
//! [`Listener`] contracts.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Dialer         │                              │  HTTP front end │
//! │  → Connection   │         WebSocket            │  → Listener     │
//! │                 │◄────────────────────────────►│  → accept queue │
//! │  read / write   │    one binary message per    │  → Connection   │
//! │                 │           write              │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Connection::connect` or `WebSocketListener::handle_upgrade` completes
//!    the opening handshake
//! 2. `Connection::read` / `Connection::write` move bytes
//! 3. `Connection::close`, drop, or cancellation of the owning scope sends
//!    the close frame and runs cleanups exactly once
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Byte-stream adapter over one websocket |
//! | `listener` | Upgrade handler and bounded accept queue |
//!
//! [`Conn`]: crate::net::Conn
//! [`Listener`]: crate::net::Listener

// ============================================================================
// Submodules
// ============================================================================

/// Byte-stream adapter over one websocket.
pub mod connection;

/// Upgrade handler and bounded accept queue.
pub mod listener;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, DialedStream};
pub use listener::{AcceptOptions, DEFAULT_QUEUE_CAPACITY, WebSocketListener};
