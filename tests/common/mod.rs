//! Scripted in-memory socket for driving the read/write loops
//! deterministically.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::VecDeque;
use std::io;
use std::task::{Context, Poll};
use wsnet::socket::stream::{IoStatus, Readiness, StreamSocket};

#[derive(Debug)]
enum Step {
    Data(Vec<u8>),
    WouldBlock(Readiness),
    Eof,
    Fail(io::ErrorKind),
}

/// Replays a fixed sequence of read outcomes and records writes.
///
/// Once the script is exhausted every read reports a close.
#[derive(Debug, Default)]
pub struct ScriptedSocket {
    reads: VecDeque<Step>,
    pub written: Vec<u8>,
    pub read_calls: usize,
    pub requested: Vec<usize>,
    write_limit: Option<usize>,
    block_writes: bool,
    blocked_last_write: bool,
    writes_closed: bool,
    never_ready: bool,
    ready_polls: Cell<usize>,
}

impl ScriptedSocket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(mut self, data: impl AsRef<[u8]>) -> Self {
        self.reads.push_back(Step::Data(data.as_ref().to_vec()));
        self
    }

    pub fn would_block(self) -> Self {
        self.would_block_on(Readiness::Readable)
    }

    pub fn would_block_on(mut self, readiness: Readiness) -> Self {
        self.reads.push_back(Step::WouldBlock(readiness));
        self
    }

    pub fn eof(mut self) -> Self {
        self.reads.push_back(Step::Eof);
        self
    }

    pub fn fail(mut self, kind: io::ErrorKind) -> Self {
        self.reads.push_back(Step::Fail(kind));
        self
    }

    /// Accept at most `n` bytes per write attempt.
    pub fn write_limit(mut self, n: usize) -> Self {
        self.write_limit = Some(n);
        self
    }

    /// Report would-block on every other write attempt.
    pub fn block_writes(mut self) -> Self {
        self.block_writes = true;
        self
    }

    pub fn close_writes(mut self) -> Self {
        self.writes_closed = true;
        self
    }

    /// Readiness polls stay pending forever.
    pub fn never_ready(mut self) -> Self {
        self.never_ready = true;
        self
    }

    pub fn remaining_reads(&self) -> usize {
        self.reads.len()
    }

    pub fn ready_polls(&self) -> usize {
        self.ready_polls.get()
    }

    pub fn written_str(&self) -> String {
        String::from_utf8_lossy(&self.written).into_owned()
    }
}

impl StreamSocket for ScriptedSocket {
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> io::Result<IoStatus> {
        self.read_calls += 1;
        self.requested.push(buf.len());
        match self.reads.pop_front() {
            Some(Step::Data(mut data)) => {
                if data.len() > buf.len() {
                    let rest = data.split_off(buf.len());
                    self.reads.push_front(Step::Data(rest));
                }
                buf[..data.len()].copy_from_slice(&data);
                Ok(IoStatus::Done(data.len()))
            }
            Some(Step::WouldBlock(readiness)) => Ok(IoStatus::WouldBlock(readiness)),
            Some(Step::Fail(kind)) => Err(io::Error::new(kind, "scripted failure")),
            Some(Step::Eof) | None => Ok(IoStatus::Closed),
        }
    }

    fn write_nonblocking(&mut self, buf: &[u8]) -> io::Result<IoStatus> {
        if self.writes_closed {
            return Ok(IoStatus::Closed);
        }
        if self.block_writes && !self.blocked_last_write {
            self.blocked_last_write = true;
            return Ok(IoStatus::WouldBlock(Readiness::Writable));
        }
        self.blocked_last_write = false;

        let n = self.write_limit.map_or(buf.len(), |limit| limit.min(buf.len()));
        self.written.extend_from_slice(&buf[..n]);
        Ok(IoStatus::Done(n))
    }

    fn poll_ready(&self, _cx: &mut Context<'_>, _readiness: Readiness) -> Poll<io::Result<()>> {
        self.ready_polls.set(self.ready_polls.get() + 1);
        if self.never_ready {
            Poll::Pending
        } else {
            Poll::Ready(Ok(()))
        }
    }
}
