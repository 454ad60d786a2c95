//! Readiness-driven read/write loops over a [`StreamSocket`].
//!
//! Every operation here follows one retry protocol: attempt the non-blocking
//! call, and on [`IoStatus::WouldBlock`] wait for the requested readiness and
//! attempt again. Would-block never surfaces to the caller. A clean close
//! ends accumulation without an error; anything else is fatal.

use crate::base::neterror::NetError;
use crate::socket::stream::{IoStatus, Readiness, StreamSocket};
use bytes::BytesMut;
use std::time::Duration;

/// Size of each individual read attempt.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Tuning for the read/write loops.
///
/// The defaults impose no timeout and no size bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Bytes requested per read attempt.
    pub chunk_size: usize,
    /// Upper bound on a single readiness wait.
    pub readiness_timeout: Option<Duration>,
    /// Upper bound on bytes accumulated by one `read_until` call.
    pub max_buffered: Option<usize>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            readiness_timeout: None,
            max_buffered: None,
        }
    }
}

impl ReadOptions {
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    pub fn readiness_timeout(mut self, timeout: Duration) -> Self {
        self.readiness_timeout = Some(timeout);
        self
    }

    pub fn max_buffered(mut self, limit: usize) -> Self {
        self.max_buffered = Some(limit);
        self
    }
}

/// Bytes gathered by [`read_until`].
#[derive(Debug, Default)]
pub struct Accumulated {
    /// Everything read, in arrival order.
    pub data: BytesMut,
    /// True if accumulation ended because the peer closed the stream
    /// before the stop condition held.
    pub closed: bool,
}

/// Block the current task until `socket` reaches `readiness`.
///
/// Poll failures are converted with `on_error`; an expired `timeout` is
/// reported as [`NetError::ConnectionTimedOut`].
pub async fn wait_ready<S>(
    socket: &S,
    readiness: Readiness,
    timeout: Option<Duration>,
    on_error: fn(std::io::Error) -> NetError,
) -> Result<(), NetError>
where
    S: StreamSocket + ?Sized,
{
    let ready = std::future::poll_fn(|cx| socket.poll_ready(cx, readiness));
    let res = match timeout {
        Some(limit) => tokio::time::timeout(limit, ready)
            .await
            .map_err(|_| NetError::ConnectionTimedOut)?,
        None => ready.await,
    };
    res.map_err(on_error)
}

/// Read until `stop` holds for the accumulated bytes or the peer closes.
///
/// `stop` is checked after every successful read, so accumulation ends on
/// the first chunk that satisfies it and no further chunk is requested. A
/// close before that point returns what was gathered with
/// [`Accumulated::closed`] set.
pub async fn read_until<S, F>(
    socket: &mut S,
    options: &ReadOptions,
    mut stop: F,
) -> Result<Accumulated, NetError>
where
    S: StreamSocket + ?Sized,
    F: FnMut(&[u8]) -> bool,
{
    let mut acc = Accumulated::default();
    let mut chunk = vec![0u8; options.chunk_size.max(1)];

    loop {
        match socket.read_nonblocking(&mut chunk).map_err(NetError::ReadFailed)? {
            IoStatus::Done(n) => {
                acc.data.extend_from_slice(&chunk[..n]);
                if let Some(limit) = options.max_buffered {
                    if acc.data.len() > limit {
                        return Err(NetError::MsgTooBig { limit });
                    }
                }
                if stop(&acc.data) {
                    return Ok(acc);
                }
            }
            IoStatus::WouldBlock(readiness) => {
                tracing::trace!("read would block, waiting for {:?}", readiness);
                wait_ready(socket, readiness, options.readiness_timeout, NetError::ReadFailed)
                    .await?;
            }
            IoStatus::Closed => {
                tracing::debug!("stream closed after {} bytes", acc.data.len());
                acc.closed = true;
                return Ok(acc);
            }
        }
    }
}

/// One successful read, retried across would-block.
///
/// Returns an empty buffer with `closed` set if the peer closed instead.
pub async fn read_once<S>(socket: &mut S, options: &ReadOptions) -> Result<Accumulated, NetError>
where
    S: StreamSocket + ?Sized,
{
    read_until(socket, options, |buf| !buf.is_empty()).await
}

/// Write all of `buf`, retried across would-block and partial writes.
pub async fn write_all<S>(
    socket: &mut S,
    mut buf: &[u8],
    options: &ReadOptions,
) -> Result<(), NetError>
where
    S: StreamSocket + ?Sized,
{
    while !buf.is_empty() {
        match socket.write_nonblocking(buf).map_err(NetError::WriteFailed)? {
            IoStatus::Done(n) => buf = &buf[n..],
            IoStatus::WouldBlock(readiness) => {
                tracing::trace!("write would block, waiting for {:?}", readiness);
                wait_ready(socket, readiness, options.readiness_timeout, NetError::WriteFailed)
                    .await?;
            }
            IoStatus::Closed => return Err(NetError::ConnectionClosed),
        }
    }
    Ok(())
}

/// Position just past the first `\r\n\r\n` in `buf`.
pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + 4)
}
