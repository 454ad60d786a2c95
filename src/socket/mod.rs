//! Socket and connection management.
//!
//! Mirrors the shape of Chromium's `net/socket/`:
//! - [`connectjob`]: DNS → TCP → TLS connection flow
//! - [`client`]: the connected socket, plain or TLS
//! - [`stream`]: non-blocking read/write attempts with explicit would-block
//! - [`reader`]: readiness-driven read and write loops
//! - [`tls`]: TLS configuration with BoringSSL

pub mod client;
pub mod connectjob;
pub mod endpoint;
pub mod reader;
pub mod stream;
pub mod tls;
