//! Client side: dialing websocket connections.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `dialer` | [`Dialer`] and the `dial*` entry points |
//! | `options` | [`DialOption`], [`DialOptions`], [`HttpClient`] |

// ============================================================================
// Submodules
// ============================================================================

/// Dialer facade.
pub mod dialer;

/// Dial-time configuration.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use dialer::{Dialer, dial, dial_context, grpc_dialer};
pub use options::{DialOption, DialOptions, HttpClient, with_http_client};
