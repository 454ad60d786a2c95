use std::io;
use thiserror::Error;

/// Coarse failure class of a [`NetError`].
///
/// Callers that only care about which phase failed (establishing the
/// transport, reading, writing, or negotiating the upgrade) match on this
/// instead of the individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// DNS, TCP or TLS establishment failed.
    Connect,
    /// Unexpected I/O fault while accumulating bytes.
    Read,
    /// Unexpected I/O fault while sending bytes.
    Write,
    /// Opening handshake failed or was rejected.
    Handshake,
    /// Frame-level or session-level protocol violation.
    Protocol,
    /// Bad caller-supplied configuration.
    Config,
}

#[derive(Debug, Error)]
pub enum NetError {
    // Connection Errors
    #[error("Name not resolved: {domain}: {source}")]
    NameNotResolvedFor {
        domain: String,
        #[source]
        source: io::Error,
    },
    #[error("Connection to {host}:{port} failed: {source}")]
    ConnectionFailedTo {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("SSL handshake with {host} failed: {reason}")]
    SslHandshakeFailed { host: String, reason: String },
    #[error("SSL protocol error")]
    SslProtocolError,
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("Connection to {host}:{port} timed out")]
    ConnectTimedOut { host: String, port: u16 },
    #[error("Connection timed out")]
    ConnectionTimedOut,

    // Socket I/O Errors
    #[error("Socket read failed: {0}")]
    ReadFailed(#[source] io::Error),
    #[error("Socket write failed: {0}")]
    WriteFailed(#[source] io::Error),
    #[error("Message too big (limit {limit} bytes)")]
    MsgTooBig { limit: usize },

    // Handshake Errors
    #[error("Response headers truncated")]
    ResponseHeadersTruncated,
    #[error("Invalid HTTP response: {0}")]
    InvalidHttpResponse(String),
    #[error("WebSocket upgrade rejected with status {status}")]
    WsUpgradeRejected { status: u16 },
    #[error("WebSocket handshake missing header: {0}")]
    WsMissingHeader(&'static str),
    #[error("Sec-WebSocket-Accept mismatch: expected {expected}, got {actual}")]
    WsAcceptMismatch { expected: String, actual: String },

    // Session Errors
    #[error("WebSocket protocol error: {0}")]
    WsProtocolError(String),
    #[error("WebSocket reply still pending")]
    WsReplyPending,

    // URL Errors
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Disallowed URL scheme")]
    DisallowedUrlScheme,
}

impl NetError {
    /// Chromium `net_error_list.h` code for this error.
    pub fn as_i32(&self) -> i32 {
        match self {
            NetError::ConnectionClosed => -100,
            NetError::ConnectionFailedTo { .. } => -104,
            NetError::NameNotResolvedFor { .. } => -105,
            NetError::SslProtocolError => -107,
            NetError::SslHandshakeFailed { .. } => -107,
            NetError::ConnectTimedOut { .. } => -118,
            // Stalled I/O on an established connection is ERR_TIMED_OUT
            NetError::ConnectionTimedOut => -7,
            NetError::MsgTooBig { .. } => -142,
            NetError::WsProtocolError(_) => -145,
            NetError::WsReplyPending => -145,
            NetError::WsUpgradeRejected { .. } => -173,
            NetError::WsMissingHeader(_) => -173,
            NetError::WsAcceptMismatch { .. } => -173,
            NetError::InvalidUrl => -300,
            NetError::DisallowedUrlScheme => -301,
            NetError::InvalidHttpResponse(_) => -370,
            NetError::ResponseHeadersTruncated => -357,
            // Edge case errors (custom codes starting at -910)
            NetError::ReadFailed(_) => -910,
            NetError::WriteFailed(_) => -911,
        }
    }

    /// Which phase of the connection this error belongs to.
    pub fn class(&self) -> ErrorClass {
        match self {
            NetError::NameNotResolvedFor { .. }
            | NetError::ConnectionFailedTo { .. }
            | NetError::SslHandshakeFailed { .. }
            | NetError::SslProtocolError
            | NetError::ConnectTimedOut { .. } => ErrorClass::Connect,
            NetError::ReadFailed(_)
            | NetError::ConnectionTimedOut
            | NetError::MsgTooBig { .. }
            | NetError::ConnectionClosed => ErrorClass::Read,
            NetError::WriteFailed(_) => ErrorClass::Write,
            NetError::ResponseHeadersTruncated
            | NetError::InvalidHttpResponse(_)
            | NetError::WsUpgradeRejected { .. }
            | NetError::WsMissingHeader(_)
            | NetError::WsAcceptMismatch { .. } => ErrorClass::Handshake,
            NetError::WsProtocolError(_) | NetError::WsReplyPending => ErrorClass::Protocol,
            NetError::InvalidUrl | NetError::DisallowedUrlScheme => ErrorClass::Config,
        }
    }

    /// True for DNS/TCP/TLS establishment failures.
    pub fn is_connect_error(&self) -> bool {
        self.class() == ErrorClass::Connect
    }

    /// True for opening handshake failures.
    pub fn is_handshake_error(&self) -> bool {
        self.class() == ErrorClass::Handshake
    }

    /// True for faults raised while reading from the socket.
    pub fn is_read_error(&self) -> bool {
        self.class() == ErrorClass::Read
    }
}
