//! Dial-time configuration.
//!
//! Options are small values implementing [`DialOption`]. A dial resolves them
//! once, in order, against [`DialOptions::default()`]; a later option
//! overrides an earlier one.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use wsnet::{Dialer, HttpClient, with_http_client};
//!
//! let client = HttpClient::new()
//!     .with_timeout(Duration::from_secs(10))
//!     .with_header("Authorization", "Bearer token");
//!
//! let dialer = Dialer::new().option(with_http_client(client));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default handshake timeout of [`HttpClient`].
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// DialOption
// ============================================================================

/// A single dial configuration step.
pub trait DialOption: fmt::Debug + Send + Sync {
    /// Applies this option to `options`.
    fn apply(&self, options: &mut DialOptions);
}

// ============================================================================
// DialOptions
// ============================================================================

/// Resolved dial parameters.
#[derive(Debug, Clone, Default)]
pub struct DialOptions {
    /// Client used for the upgrade request.
    pub http_client: HttpClient,
}

impl DialOptions {
    /// Applies `options` in order on top of the defaults.
    #[must_use]
    pub fn resolve(options: &[Arc<dyn DialOption>]) -> Self {
        let mut resolved = Self::default();
        for option in options {
            option.apply(&mut resolved);
        }
        resolved
    }
}

// ============================================================================
// HttpClient
// ============================================================================

/// Settings for the HTTP upgrade request of a dial.
#[derive(Debug, Clone)]
pub struct HttpClient {
    /// Upper bound on the whole opening handshake.
    pub timeout: Duration,

    /// Extra headers sent with the upgrade request.
    pub headers: Vec<(String, String)>,

    /// Engine configuration (message and frame limits).
    pub config: Option<WebSocketConfig>,

    /// Disable Nagle's algorithm on the underlying TCP stream.
    pub nodelay: bool,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a client with a one minute timeout.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            headers: Vec::new(),
            config: None,
            nodelay: false,
        }
    }

    /// Sets the handshake timeout.
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Adds a request header.
    #[inline]
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the engine configuration.
    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: WebSocketConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Disables Nagle's algorithm on the TCP stream.
    #[inline]
    #[must_use]
    pub fn with_nodelay(mut self) -> Self {
        self.nodelay = true;
        self
    }

    /// Builds the upgrade request for `url`.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if a header name or value is invalid
    /// - [`Error::WebSocket`] if `url` is not a valid request URI
    pub fn build_request(&self, url: &str) -> Result<Request> {
        let mut request = url.into_client_request()?;

        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::config(format!("Invalid header name {name:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::config(format!("Invalid value for header {name}: {e}")))?;
            request.headers_mut().append(name, value);
        }

        Ok(request)
    }
}

// ============================================================================
// Options
// ============================================================================

/// Replaces the client used for the upgrade request.
#[derive(Debug, Clone)]
struct HttpClientOption {
    client: HttpClient,
}

impl DialOption for HttpClientOption {
    fn apply(&self, options: &mut DialOptions) {
        options.http_client = self.client.clone();
    }
}

/// Returns an option that sets the HTTP client used for the handshake.
#[must_use]
pub fn with_http_client(client: HttpClient) -> Arc<dyn DialOption> {
    Arc::new(HttpClientOption { client })
}

// ============================================================================
// Tests
// ============================================================================
