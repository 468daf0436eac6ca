//! Network dialer for websocket connections.
//!
//! Accepts the usual `network, address` pair. The network must be
//! `"websocket"` and the address a `ws://host/path` or `wss://host/path`
//! URL. Both are checked before any network activity.
//!
//! Tunneling a TLS protocol over `wss://` encrypts twice: once in the
//! websocket's TLS layer and once in the tunneled protocol.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::net::WEBSOCKET_NETWORK;
use crate::transport::Connection;

use super::options::{DialOption, DialOptions};

// ============================================================================
// Constants
// ============================================================================

/// URL schemes accepted by the dialer.
const SCHEMES: [&str; 2] = ["ws://", "wss://"];

// ============================================================================
// Dialer
// ============================================================================

/// A websocket dialer with a fixed list of [`DialOption`]s.
///
/// # Example
///
/// ```ignore
/// use wsnet::Dialer;
///
/// let conn = Dialer::new().dial("websocket", "ws://127.0.0.1:8080/tunnel").await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Dialer {
    options: Vec<Arc<dyn DialOption>>,
}

impl Dialer {
    /// Creates a dialer with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a dialer with the given options.
    #[must_use]
    pub fn with_options(options: impl IntoIterator<Item = Arc<dyn DialOption>>) -> Self {
        Self {
            options: options.into_iter().collect(),
        }
    }

    /// Appends an option.
    #[inline]
    #[must_use]
    pub fn option(mut self, option: Arc<dyn DialOption>) -> Self {
        self.options.push(option);
        self
    }

    /// Dials `address` on `network`.
    ///
    /// # Errors
    ///
    /// See [`Dialer::dial_context`].
    pub async fn dial(&self, network: &str, address: &str) -> Result<Connection> {
        self.dial_context(&CancellationToken::new(), network, address)
            .await
    }

    /// Dials `address` on `network`, giving up when `scope` is cancelled.
    ///
    /// `scope` bounds the handshake only.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidNetwork`] if `network` is not `"websocket"`
    /// - [`Error::InvalidAddress`] if `address` is not a websocket URL
    /// - any handshake error of [`Connection::connect`]
    pub async fn dial_context(
        &self,
        scope: &CancellationToken,
        network: &str,
        address: &str,
    ) -> Result<Connection> {
        validate(network, address)?;

        debug!(address, "Dialing websocket");

        let options = DialOptions::resolve(&self.options);
        Connection::connect(scope, address, &options).await
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Dials with default options.
///
/// # Errors
///
/// See [`Dialer::dial_context`].
pub async fn dial(network: &str, address: &str) -> Result<Connection> {
    Dialer::new().dial(network, address).await
}

/// Dials with default options, giving up when `scope` is cancelled.
///
/// # Errors
///
/// See [`Dialer::dial_context`].
pub async fn dial_context(
    scope: &CancellationToken,
    network: &str,
    address: &str,
) -> Result<Connection> {
    Dialer::new().dial_context(scope, network, address).await
}

/// Dialer for gRPC channels: the network is always `"websocket"`.
///
/// A gRPC target of the form `passthrough:///ws://host/path` hands the
/// websocket URL through unchanged.
///
/// # Errors
///
/// See [`Dialer::dial_context`].
pub async fn grpc_dialer(scope: &CancellationToken, address: &str) -> Result<Connection> {
    dial_context(scope, WEBSOCKET_NETWORK, address).await
}

/// Checks the network name and URL scheme.
fn validate(network: &str, address: &str) -> Result<()> {
    if network != WEBSOCKET_NETWORK {
        return Err(Error::invalid_network(network));
    }

    if !SCHEMES.iter().any(|scheme| address.starts_with(scheme)) {
        return Err(Error::invalid_address(address));
    }

    let url = Url::parse(address).map_err(|_| Error::invalid_address(address))?;
    if !url.has_host() {
        return Err(Error::invalid_address(address));
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
