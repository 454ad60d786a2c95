use crate::socket::stream::{IoStatus, NonBlockingTcp, Readiness, StreamSocket};
use boring::ssl::SslStream;
use std::io;
use std::net::SocketAddr;
use std::task::{Context, Poll};
use tokio::net::TcpStream;

/// Represents a connected socket (TCP or SSL).
/// Mimics net::StreamSocket.
#[derive(Debug)]
pub enum SocketType {
    Tcp(TcpStream),
    Ssl(SslStream<NonBlockingTcp>),
}

impl SocketType {
    fn tcp(&self) -> &TcpStream {
        match self {
            SocketType::Tcp(s) => s,
            SocketType::Ssl(s) => s.get_ref().get_ref(),
        }
    }

    /// True if this socket carries a TLS session.
    pub fn is_secure(&self) -> bool {
        matches!(self, SocketType::Ssl(_))
    }

    /// Address of the connected peer.
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.tcp().peer_addr()
    }

    /// Negotiated TLS protocol version, e.g. `"TLSv1.3"`.
    pub fn tls_version(&self) -> Option<&'static str> {
        match self {
            SocketType::Tcp(_) => None,
            SocketType::Ssl(s) => Some(s.ssl().version_str()),
        }
    }

    /// Best-effort orderly teardown.
    ///
    /// Sends a TLS close_notify when possible; never waits for the peer's.
    /// The TCP socket itself is released when `self` is dropped.
    pub fn shutdown(&mut self) {
        if let SocketType::Ssl(s) = self {
            if let Err(e) = s.shutdown() {
                tracing::debug!("TLS close_notify not sent: {}", e);
            }
        }
    }
}

impl StreamSocket for SocketType {
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> io::Result<IoStatus> {
        match self {
            SocketType::Tcp(s) => s.read_nonblocking(buf),
            SocketType::Ssl(s) => s.read_nonblocking(buf),
        }
    }

    fn write_nonblocking(&mut self, buf: &[u8]) -> io::Result<IoStatus> {
        match self {
            SocketType::Tcp(s) => s.write_nonblocking(buf),
            SocketType::Ssl(s) => s.write_nonblocking(buf),
        }
    }

    fn poll_ready(&self, cx: &mut Context<'_>, readiness: Readiness) -> Poll<io::Result<()>> {
        StreamSocket::poll_ready(self.tcp(), cx, readiness)
    }
}
