//! WebSocket session over a raw [`StreamSocket`].
//!
//! A session alternates strictly between sending one text frame and
//! receiving the reply to it. The socket is owned exclusively by the session
//! and released when the session is dropped.

use crate::base::neterror::NetError;
use crate::socket::client::SocketType;
use crate::socket::connectjob::ConnectJob;
use crate::socket::endpoint::Endpoint;
use crate::socket::reader::{read_once, write_all, ReadOptions};
use crate::socket::stream::StreamSocket;
use crate::socket::tls::TlsConfig;
use crate::ws::frame::{Frame, FrameCodec, FrameType};
use crate::ws::handshake::{accept_header, perform_handshake, ClientHandshake, HandshakeResult};
use bytes::{Bytes, BytesMut};
use std::time::Duration;
use url::Url;

/// Where a session is in its send/receive cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Ready to send.
    Idle,
    /// A frame was sent and its reply has not been decoded yet.
    AwaitingReply,
}

/// Result of one receive step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A complete frame was decoded.
    Message(Frame),
    /// Bytes arrived but do not yet form a complete frame. They stay
    /// buffered and the next receive continues from them.
    Incomplete { buffered: usize },
    /// The peer closed the connection.
    Closed,
}

/// Established WebSocket connection.
#[derive(Debug)]
pub struct WebSocket<S: StreamSocket = SocketType> {
    socket: S,
    url: Url,
    codec: FrameCodec,
    options: ReadOptions,
    state: SessionState,
    pending: BytesMut,
    raw_response: Bytes,
    status: http::StatusCode,
    headers: http::HeaderMap,
}

impl WebSocket<SocketType> {
    /// Connect to a WebSocket server with default settings.
    ///
    /// # Example
    /// ```ignore
    /// let mut ws = WebSocket::connect("ws://127.0.0.1:8080/").await?;
    /// ```
    pub async fn connect(url: &str) -> Result<Self, NetError> {
        WebSocketBuilder::new().url(url)?.connect().await
    }

    /// Send a TLS close_notify if applicable and release the connection.
    pub fn close(mut self) {
        tracing::debug!("Closing WebSocket connection to {}", self.url);
        self.socket.shutdown();
    }
}

impl<S: StreamSocket> WebSocket<S> {
    /// Run the opening handshake on an already connected socket.
    ///
    /// On failure the socket is dropped.
    pub async fn handshake(
        mut socket: S,
        handshake: ClientHandshake,
        options: ReadOptions,
    ) -> Result<Self, NetError> {
        let url = handshake.url().clone();
        let HandshakeResult {
            version,
            response,
            raw_response,
            trailing,
        } = perform_handshake(&mut socket, handshake, &options).await?;
        let codec = FrameCodec::new(version)?.with_max_payload(options.max_buffered);
        let (parts, ()) = response.into_parts();
        tracing::info!("Handshake with {} complete", url);

        Ok(Self {
            socket,
            url,
            codec,
            options,
            state: SessionState::Idle,
            pending: BytesMut::from(&trailing[..]),
            raw_response,
            status: parts.status,
            headers: parts.headers,
        })
    }

    /// The underlying transport.
    pub fn socket(&self) -> &S {
        &self.socket
    }

    /// Get the URL this WebSocket is connected to.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Negotiated protocol version.
    pub fn version(&self) -> u8 {
        self.codec.version()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Status of the handshake response.
    pub fn status(&self) -> http::StatusCode {
        self.status
    }

    /// Headers of the handshake response.
    pub fn headers(&self) -> &http::HeaderMap {
        &self.headers
    }

    /// Handshake response head exactly as received.
    pub fn raw_response(&self) -> &Bytes {
        &self.raw_response
    }

    /// Bytes received but not yet decoded.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Send one text frame.
    ///
    /// Fails with [`NetError::WsReplyPending`] if the previous frame's reply
    /// has not been received.
    pub async fn send_text(&mut self, text: &str) -> Result<(), NetError> {
        if self.state == SessionState::AwaitingReply {
            return Err(NetError::WsReplyPending);
        }

        tracing::info!("Sending message to the server...");
        let bytes = self.codec.encode(&Frame::text(text))?;
        write_all(&mut self.socket, &bytes, &self.options).await?;
        self.state = SessionState::AwaitingReply;
        Ok(())
    }

    /// Receive step: decode a buffered frame, or read once and try again.
    ///
    /// With [`ReadOptions::max_buffered`] set, a frame whose declared length
    /// exceeds it fails with [`NetError::MsgTooBig`] as soon as its header
    /// arrives, so a partial frame never grows past the bound.
    pub async fn recv(&mut self) -> Result<Reply, NetError> {
        if let Some(frame) = self.codec.decode(&mut self.pending)? {
            return Ok(self.complete(frame));
        }

        tracing::info!("Receiving message from the server...");
        let acc = read_once(&mut self.socket, &self.options).await?;
        if acc.closed {
            tracing::warn!("Server closed the connection");
            self.state = SessionState::Idle;
            return Ok(Reply::Closed);
        }
        self.pending.unsplit(acc.data);

        match self.codec.decode(&mut self.pending)? {
            Some(frame) => Ok(self.complete(frame)),
            None => {
                tracing::debug!("Partial frame, {} bytes buffered", self.pending.len());
                Ok(Reply::Incomplete {
                    buffered: self.pending.len(),
                })
            }
        }
    }

    fn complete(&mut self, frame: Frame) -> Reply {
        self.state = SessionState::Idle;
        if frame.kind() == FrameType::Close {
            tracing::warn!("Server sent a close frame");
            return Reply::Closed;
        }
        match frame.as_text() {
            Some(text) => tracing::info!("Received: {}", text),
            None => tracing::info!("Received {} bytes of non-UTF-8 text", frame.payload().len()),
        }
        Reply::Message(frame)
    }

    /// Send `text` and receive until its reply is complete or the peer
    /// closes.
    pub async fn round_trip(&mut self, text: &str) -> Result<Reply, NetError> {
        self.send_text(text).await?;
        loop {
            match self.recv().await? {
                Reply::Incomplete { .. } => continue,
                reply => return Ok(reply),
            }
        }
    }

    /// Repeat send/receive until the peer closes.
    ///
    /// `payload` supplies each outgoing message and `on_reply` sees each
    /// decoded reply. Returns `Ok(())` when the peer closes and the first
    /// fatal error otherwise.
    pub async fn run<P, F>(&mut self, mut payload: P, mut on_reply: F) -> Result<(), NetError>
    where
        P: FnMut() -> String,
        F: FnMut(Frame),
    {
        loop {
            match self.round_trip(&payload()).await? {
                Reply::Message(frame) => on_reply(frame),
                // round_trip only yields Message or Closed
                _ => return Ok(()),
            }
        }
    }
}

impl<S: StreamSocket> Drop for WebSocket<S> {
    fn drop(&mut self) {
        tracing::debug!("Releasing WebSocket connection to {}", self.url);
    }
}

/// WebSocket connection builder.
#[derive(Debug, Clone)]
pub struct WebSocketBuilder {
    url: Option<Url>,
    headers: Vec<(String, String)>,
    tls: TlsConfig,
    options: ReadOptions,
    connect_timeout: Option<Duration>,
}

impl Default for WebSocketBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WebSocketBuilder {
    /// Create a new WebSocket builder.
    pub fn new() -> Self {
        Self {
            url: None,
            headers: Vec::new(),
            tls: TlsConfig::default(),
            options: ReadOptions::default(),
            connect_timeout: None,
        }
    }

    /// Set the URL to connect to.
    pub fn url(mut self, url: &str) -> Result<Self, NetError> {
        let url = Url::parse(url).map_err(|_| NetError::InvalidUrl)?;

        // Validate scheme
        Endpoint::from_url(&url)?;

        self.url = Some(url);
        Ok(self)
    }

    /// Add a header to the WebSocket handshake.
    ///
    /// Headers are sent in insertion order after the standard ones; invalid
    /// ones are dropped with the same rule as [`ClientHandshake::header`].
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if accept_header(name, value) {
            self.headers.push((name.to_string(), value.to_string()));
        }
        self
    }

    /// TLS policy for `wss://` URLs.
    pub fn tls_config(mut self, tls: TlsConfig) -> Self {
        self.tls = tls;
        self
    }

    /// Read/write loop tuning for the handshake and the session.
    pub fn read_options(mut self, options: ReadOptions) -> Self {
        self.options = options;
        self
    }

    /// Bound on DNS, TCP connect and TLS handshake together.
    ///
    /// Expiry is reported as [`NetError::ConnectTimedOut`].
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Get the URL if set.
    pub fn get_url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Get the headers.
    pub fn get_headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Check if secure (wss://).
    pub fn is_secure(&self) -> bool {
        self.url.as_ref().is_some_and(|u| u.scheme() == "wss")
    }

    /// Connect, run the handshake and return the session.
    pub async fn connect(self) -> Result<WebSocket, NetError> {
        let url = self.url.ok_or(NetError::InvalidUrl)?;
        let endpoint = Endpoint::from_url(&url)?;
        tracing::info!("Opening connection to {}", url);

        let open = ConnectJob::connect(&endpoint, &self.tls);
        let socket = match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, open)
                .await
                .map_err(|_| NetError::ConnectTimedOut {
                    host: endpoint.host().to_string(),
                    port: endpoint.port(),
                })??,
            None => open.await?,
        };

        let mut handshake = ClientHandshake::new(&url)?;
        for (name, value) in &self.headers {
            handshake = handshake.header(name, value);
        }
        WebSocket::handshake(socket, handshake, self.options).await
    }
}
