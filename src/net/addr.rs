//! Address stub for websocket endpoints.
//!
//! A websocket tunnel has no byte-stream level addressing, so both ends of a
//! connection report the session URL and listeners report a fixed literal.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use super::Addr;

// ============================================================================
// Constants
// ============================================================================

/// Network family tag shared by every websocket address.
pub const WEBSOCKET_NETWORK: &str = "websocket";

// ============================================================================
// WsAddr
// ============================================================================

/// Network address of a websocket endpoint.
///
/// The string identity is the dialed URL for connections and the literal
/// `"websocket"` for listeners.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WsAddr(String);

impl WsAddr {
    /// Creates an address carrying `url` as its identity.
    #[inline]
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Returns the address string.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Addr for WsAddr {
    #[inline]
    fn network(&self) -> &str {
        WEBSOCKET_NETWORK
    }
}

impl fmt::Display for WsAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WsAddr {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

// ============================================================================
// Tests
// ============================================================================
