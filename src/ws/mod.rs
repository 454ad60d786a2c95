//! WebSocket client support.
//!
//! Opening handshake, frame codec and a strict send-then-receive session,
//! running over the sockets in [`crate::socket`].
//!
//! # Example
//! ```ignore
//! use wsnet::ws::{Reply, WebSocket};
//!
//! let mut ws = WebSocket::connect("ws://127.0.0.1:8080/").await?;
//! if let Reply::Message(frame) = ws.round_trip("Hello, server!").await? {
//!     println!("{:?}", frame.as_text());
//! }
//! ```

mod connection;
pub mod frame;
pub mod handshake;

pub use connection::{Reply, SessionState, WebSocket, WebSocketBuilder};
pub use frame::{Frame, FrameCodec, FrameType, WS_VERSION};
pub use handshake::{ClientHandshake, HandshakeResult};
