//! Error types for wsnet.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use wsnet::{Result, dial};
//!
//! async fn example() -> Result<()> {
//!     let conn = dial("websocket", "ws://127.0.0.1:8080/tunnel").await?;
//!     conn.write(b"ping").await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidNetwork`], [`Error::InvalidAddress`] |
//! | Lifecycle | [`Error::ConnectionClosed`], [`Error::ListenerClosed`], [`Error::Cancelled`] |
//! | Handshake | [`Error::HandshakeTimeout`] |
//! | Transport | [`Error::PeerClosed`], [`Error::WebSocket`], [`Error::Io`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Configuration errors are returned before any network activity takes
/// place. Engine errors are passed through verbatim; nothing here retries.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when dial or accept options cannot be applied.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Unsupported network name.
    ///
    /// Only the `"websocket"` network can be dialed.
    #[error("Invalid network: {network:?}; Details: Only \"websocket\" network is supported")]
    InvalidNetwork {
        /// The rejected network name.
        network: String,
    },

    /// Address is not a websocket URL.
    #[error(
        "Invalid address: websocket address should be a websocket URL that starts with ws:// or wss://, got {address:?}"
    )]
    InvalidAddress {
        /// The rejected address.
        address: String,
    },

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// Operation attempted on a closed connection.
    #[error("WebSocket: Web socket is closed")]
    ConnectionClosed,

    /// Accept called on (or waiting in) a closed listener.
    #[error("Listener closed; Details: {reason}")]
    ListenerClosed {
        /// Why the listener stopped.
        reason: String,
    },

    /// The caller's cancellation scope fired before the operation finished.
    #[error("{operation} cancelled")]
    Cancelled {
        /// The interrupted operation.
        operation: String,
    },

    // ========================================================================
    // Handshake Errors
    // ========================================================================
    /// The opening handshake exceeded the HTTP client timeout.
    #[error("WebSocket handshake timed out after {timeout_ms}ms")]
    HandshakeTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// The peer closed the websocket.
    #[error("WebSocket closed by peer: status = {code}, reason = {reason:?}")]
    PeerClosed {
        /// Close status code sent by the peer (1005 when none was given).
        code: u16,
        /// Close reason sent by the peer.
        reason: String,
    },

    /// WebSocket engine error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid network error.
    #[inline]
    pub fn invalid_network(network: impl Into<String>) -> Self {
        Self::InvalidNetwork {
            network: network.into(),
        }
    }

    /// Creates an invalid address error.
    #[inline]
    pub fn invalid_address(address: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.into(),
        }
    }

    /// Creates a listener closed error.
    #[inline]
    pub fn listener_closed(reason: impl Into<String>) -> Self {
        Self::ListenerClosed {
            reason: reason.into(),
        }
    }

    /// Creates a cancelled error.
    #[inline]
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Creates a handshake timeout error.
    #[inline]
    pub fn handshake_timeout(timeout_ms: u64) -> Self {
        Self::HandshakeTimeout { timeout_ms }
    }

    /// Creates a peer closed error.
    #[inline]
    pub fn peer_closed(code: u16, reason: impl Into<String>) -> Self {
        Self::PeerClosed {
            code,
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error was raised before any network activity.
    #[inline]
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::Config { .. } | Self::InvalidNetwork { .. } | Self::InvalidAddress { .. }
        )
    }

    /// Returns `true` if the connection or listener is gone.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed
                | Self::ListenerClosed { .. }
                | Self::PeerClosed { .. }
                | Self::WebSocket(WsError::ConnectionClosed | WsError::AlreadyClosed)
        )
    }

    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::HandshakeTimeout { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================
