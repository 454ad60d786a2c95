//! Echo client.
//!
//! Connects to a WebSocket server and keeps sending "Hello, server!",
//! printing each reply, until the server closes the connection.
//!
//! ```text
//! cargo run --example echo_client -- ws://127.0.0.1:8080/
//! RUST_LOG=wsnet=debug cargo run --example echo_client
//! ```

use wsnet::ws::WebSocket;

const DEFAULT_URL: &str = "ws://127.0.0.1:8080/";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let url = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_URL.to_string());

    let mut ws = WebSocket::connect(&url).await?;
    println!("Connected to {} ({})", ws.url(), ws.status());
    if let Some(version) = ws.socket().tls_version() {
        println!("TLS: {}", version);
    }

    let mut replies = 0usize;
    let result = ws
        .run(
            || "Hello, server!".to_string(),
            |frame| {
                replies += 1;
                println!("Received: {}", frame.as_text().unwrap_or("<invalid utf-8>"));
            },
        )
        .await;

    match result {
        Ok(()) => println!("Server closed the connection after {} replies", replies),
        Err(e) => {
            eprintln!("Session failed after {} replies: {} ({})", replies, e, e.as_i32());
            return Err(e.into());
        }
    }

    ws.close();
    Ok(())
}
