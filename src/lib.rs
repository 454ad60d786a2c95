//! # wsnet
//!
//! A minimal WebSocket client over raw non-blocking sockets.
//!
//! `wsnet` opens a TCP connection (optionally wrapped in verified TLS),
//! performs the RFC 6455 opening handshake, then exchanges single text
//! frames in strict request/reply alternation. All socket I/O goes through
//! non-blocking attempts that report would-block explicitly; the retry loop
//! waits on readiness instead of blocking a thread.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wsnet::ws::WebSocket;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut ws = WebSocket::connect("ws://127.0.0.1:8080/").await.unwrap();
//!     ws.run(|| "Hello, server!".to_string(), |reply| {
//!         println!("{:?}", reply.as_text());
//!     })
//!     .await
//!     .unwrap();
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error definitions
//! - [`socket`] - Connect flow, TLS, and readiness-driven I/O
//! - [`ws`] - Handshake, frame codec and session

pub mod base;
pub mod socket;
pub mod ws;
