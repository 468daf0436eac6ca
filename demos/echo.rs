//! Echo over a websocket tunnel.
//!
//! Demonstrates:
//! - Serving a `WebSocketListener` on a TCP port
//! - Dialing it with a configured `Dialer`
//! - Echoing bytes through the accepted connection
//! - Shutting everything down through one cancellation scope
//!
//! Usage:
//!   cargo run --example echo
//!   cargo run --example echo -- --debug

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use wsnet::{AcceptOptions, Connection, Dialer, HttpClient, Result, WebSocketListener};

// ============================================================================
// Constants
// ============================================================================

const BIND_ADDR: &str = "127.0.0.1:0";
const MESSAGES: &[&str] = &["hello", "over", "websocket"];

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let debug = std::env::args().any(|a| a == "--debug");
    init_logging(debug);

    if let Err(e) = run().await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    println!("=== Echo ===\n");

    let scope = CancellationToken::new();

    // ========================================================================
    // Server
    // ========================================================================

    let tcp = TcpListener::bind(BIND_ADDR).await?;
    let url = format!("ws://{}/echo", tcp.local_addr()?);

    let listener: WebSocketListener =
        WebSocketListener::with_options(&scope, AcceptOptions::new().with_path("/echo"));

    tokio::spawn({
        let listener = listener.clone();
        async move { listener.serve(tcp).await }
    });

    tokio::spawn({
        let listener = listener.clone();
        async move {
            while let Ok(conn) = listener.accept().await {
                tokio::spawn(echo(conn));
            }
        }
    });

    println!("[Server] Listening on {url}");

    // ========================================================================
    // Client
    // ========================================================================

    let dialer = Dialer::new().option(wsnet::with_http_client(
        HttpClient::new()
            .with_timeout(Duration::from_secs(5))
            .with_nodelay(),
    ));
    let client = dialer.dial("websocket", &url).await?;
    println!("[Client] Connected to {}", client.url());

    let mut buf = [0u8; 64];
    for message in MESSAGES {
        client.write(message.as_bytes()).await?;
        let n = client.read(&mut buf).await?;
        println!("        ✓ {message} -> {}", String::from_utf8_lossy(&buf[..n]));
    }

    // ========================================================================
    // Shutdown
    // ========================================================================

    client.close();
    scope.cancel();
    println!("\n[Done] Listener closed: {}", listener.is_closed());

    Ok(())
}

// ============================================================================
// Functions
// ============================================================================

/// Writes back everything read until the connection closes.
async fn echo(conn: Connection<TcpStream>) {
    let mut buf = [0u8; 1024];
    loop {
        match conn.read(&mut buf).await {
            Ok(n) => {
                if conn.write(&buf[..n]).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "Echo connection finished");
                break;
            }
        }
    }
}

/// Initialize tracing/logging.
fn init_logging(debug: bool) {
    let filter = if debug { "wsnet=debug" } else { "wsnet=info" };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}
