//! Non-blocking socket abstraction.
//!
//! This module provides a `StreamSocket` trait that gives plain TCP and TLS
//! over TCP one uniform non-blocking surface: every read or write attempt
//! reports an explicit [`IoStatus`] (progress, would-block with the readiness
//! it needs, or terminal close) instead of signalling "try again" through
//! errors. Callers drive the retry loop themselves, see
//! [`reader`](super::reader).
//!
//! Based on Chromium's `StreamSocket` interface which provides polymorphism
//! for `TcpClientSocket` and `SSLClientSocket`.

use boring::ssl::{ErrorCode, SslStream};
use std::fmt;
use std::io::{self, Read, Write};
use std::task::{Context, Poll};
use tokio::net::TcpStream;

/// Which readiness a would-block attempt is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// No data available yet.
    Readable,
    /// Pending write state must be flushed first (TLS renegotiation, full send buffer).
    Writable,
}

/// Outcome of a single non-blocking read or write attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoStatus {
    /// `n` bytes were transferred.
    Done(usize),
    /// Nothing could be transferred until the socket reaches this readiness.
    WouldBlock(Readiness),
    /// Peer closed the stream (TCP FIN, TLS close_notify or TLS-level EOF).
    Closed,
}

/// A socket that supports non-blocking read/write attempts plus a readiness
/// poll to wait on after a would-block.
///
/// Chromium equivalent: `net::StreamSocket`
pub trait StreamSocket: fmt::Debug {
    /// Attempt one read without blocking.
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> io::Result<IoStatus>;

    /// Attempt one write without blocking.
    fn write_nonblocking(&mut self, buf: &[u8]) -> io::Result<IoStatus>;

    /// Poll until the socket reaches `readiness`.
    fn poll_ready(&self, cx: &mut Context<'_>, readiness: Readiness) -> Poll<io::Result<()>>;
}

impl StreamSocket for TcpStream {
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> io::Result<IoStatus> {
        match self.try_read(buf) {
            Ok(0) => Ok(IoStatus::Closed),
            Ok(n) => Ok(IoStatus::Done(n)),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                Ok(IoStatus::WouldBlock(Readiness::Readable))
            }
            Err(e) => Err(e),
        }
    }

    fn write_nonblocking(&mut self, buf: &[u8]) -> io::Result<IoStatus> {
        match self.try_write(buf) {
            Ok(0) if !buf.is_empty() => Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => Ok(IoStatus::Done(n)),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                Ok(IoStatus::WouldBlock(Readiness::Writable))
            }
            Err(e) => Err(e),
        }
    }

    fn poll_ready(&self, cx: &mut Context<'_>, readiness: Readiness) -> Poll<io::Result<()>> {
        match readiness {
            Readiness::Readable => self.poll_read_ready(cx),
            Readiness::Writable => self.poll_write_ready(cx),
        }
    }
}

/// Blocking-API view of a tokio `TcpStream` for BoringSSL.
///
/// `Read`/`Write` map onto `try_read`/`try_write`, so BoringSSL sees
/// `WouldBlock` and reports `WANT_READ`/`WANT_WRITE` instead of parking
/// the thread.
#[derive(Debug)]
pub struct NonBlockingTcp(pub TcpStream);

impl NonBlockingTcp {
    pub fn get_ref(&self) -> &TcpStream {
        &self.0
    }
}

impl Read for NonBlockingTcp {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.try_read(buf)
    }
}

impl Write for NonBlockingTcp {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.try_write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Map a BoringSSL error from a read attempt onto [`IoStatus`].
///
/// Any TLS-level termination ends the stream rather than failing it.
fn ssl_read_status(err: boring::ssl::Error) -> io::Result<IoStatus> {
    match err.code() {
        ErrorCode::WANT_READ => Ok(IoStatus::WouldBlock(Readiness::Readable)),
        ErrorCode::WANT_WRITE => Ok(IoStatus::WouldBlock(Readiness::Writable)),
        ErrorCode::ZERO_RETURN => Ok(IoStatus::Closed),
        ErrorCode::SYSCALL if err.io_error().is_none() => Ok(IoStatus::Closed),
        ErrorCode::SSL => {
            tracing::debug!("TLS stream terminated: {}", err);
            Ok(IoStatus::Closed)
        }
        _ => Err(into_io_error(err)),
    }
}

fn ssl_write_status(err: boring::ssl::Error) -> io::Result<IoStatus> {
    match err.code() {
        ErrorCode::WANT_READ => Ok(IoStatus::WouldBlock(Readiness::Readable)),
        ErrorCode::WANT_WRITE => Ok(IoStatus::WouldBlock(Readiness::Writable)),
        ErrorCode::ZERO_RETURN => Ok(IoStatus::Closed),
        _ => Err(into_io_error(err)),
    }
}

fn into_io_error(err: boring::ssl::Error) -> io::Error {
    match err.into_io_error() {
        Ok(e) => e,
        Err(e) => io::Error::new(io::ErrorKind::Other, e),
    }
}

impl StreamSocket for SslStream<NonBlockingTcp> {
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> io::Result<IoStatus> {
        match self.ssl_read(buf) {
            Ok(0) => Ok(IoStatus::Closed),
            Ok(n) => Ok(IoStatus::Done(n)),
            Err(e) => ssl_read_status(e),
        }
    }

    fn write_nonblocking(&mut self, buf: &[u8]) -> io::Result<IoStatus> {
        match self.ssl_write(buf) {
            Ok(n) => Ok(IoStatus::Done(n)),
            Err(e) => ssl_write_status(e),
        }
    }

    fn poll_ready(&self, cx: &mut Context<'_>, readiness: Readiness) -> Poll<io::Result<()>> {
        StreamSocket::poll_ready(self.get_ref().get_ref(), cx, readiness)
    }
}
