//! WebSocket opening handshake (RFC 6455 Section 4), client side.
//!
//! ```http
//! GET /chat HTTP/1.1
//! Host: server.example.com
//! Upgrade: websocket
//! Connection: Upgrade
//! Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==
//! Sec-WebSocket-Version: 13
//! ```
//!
//! The response head is collected with [`read_until`] up to the blank line.
//! Anything the server sent after that line belongs to the frame stream and
//! is handed back in [`HandshakeResult::trailing`].

use crate::base::neterror::NetError;
use crate::socket::endpoint::Endpoint;
use crate::socket::reader::{find_header_end, read_until, write_all, ReadOptions};
use crate::socket::stream::StreamSocket;
use crate::ws::frame::WS_VERSION;
use base64::Engine;
use bytes::{Bytes, BytesMut};
use http::header::{HeaderName, HeaderValue};
use http::{Response, StatusCode, Version};
use url::Url;

/// RFC 6455 GUID for Sec-WebSocket-Accept calculation.
const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Compute the Sec-WebSocket-Accept value from a client key.
///
/// ```
/// use wsnet::ws::handshake::compute_accept_key;
///
/// let accept = compute_accept_key("dGhlIHNhbXBsZSBub25jZQ==");
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
pub fn compute_accept_key(client_key: &str) -> String {
    let mut input = Vec::with_capacity(client_key.len() + WS_GUID.len());
    input.extend_from_slice(client_key.as_bytes());
    input.extend_from_slice(WS_GUID.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(boring::sha::sha1(&input))
}

/// Random 16-byte nonce, base64 encoded.
fn generate_client_key() -> Result<String, NetError> {
    let mut key = [0u8; 16];
    boring::rand::rand_bytes(&mut key).map_err(|_| NetError::SslProtocolError)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(key))
}

/// True if `name: value` can be written into the request as-is.
///
/// Rejected headers (including values with embedded CR/LF) are logged.
pub(crate) fn accept_header(name: &str, value: &str) -> bool {
    let valid =
        HeaderName::from_bytes(name.as_bytes()).is_ok() && HeaderValue::from_str(value).is_ok();
    if !valid {
        tracing::debug!("Dropping invalid handshake header {:?}", name);
    }
    valid
}

/// Client half of one handshake attempt.
///
/// Holds the requested URL, the protocol version and the response bytes as
/// they arrive. Consumed by [`perform_handshake`].
#[derive(Debug, Clone)]
pub struct ClientHandshake {
    url: Url,
    host_header: String,
    key: String,
    version: u8,
    headers: Vec<(String, String)>,
    response: BytesMut,
}

impl ClientHandshake {
    pub fn new(url: &Url) -> Result<Self, NetError> {
        let endpoint = Endpoint::from_url(url)?;
        Ok(Self {
            url: url.clone(),
            host_header: endpoint.host_header(),
            key: generate_client_key()?,
            version: WS_VERSION,
            headers: Vec::new(),
            response: BytesMut::new(),
        })
    }

    /// Append an extra request header, sent verbatim after the standard ones.
    ///
    /// Names or values that are not valid HTTP (including embedded CR/LF) are
    /// dropped.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if accept_header(name, value) {
            self.headers.push((name.to_string(), value.to_string()));
        }
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// Request target: path plus query.
    fn target(&self) -> String {
        match self.url.query() {
            Some(q) => format!("{}?{}", self.url.path(), q),
            None => self.url.path().to_string(),
        }
    }

    /// Serialize the upgrade request.
    pub fn request_bytes(&self) -> Vec<u8> {
        let mut request = format!(
            "GET {} HTTP/1.1\r\n\
             Host: {}\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Key: {}\r\n\
             Sec-WebSocket-Version: {}\r\n",
            self.target(),
            self.host_header,
            self.key,
            self.version
        );

        for (name, value) in &self.headers {
            request.push_str(name);
            request.push_str(": ");
            request.push_str(value);
            request.push_str("\r\n");
        }

        request.push_str("\r\n");
        request.into_bytes()
    }

    /// Check that `response` accepts this handshake.
    pub fn validate_response(&self, response: &Response<()>) -> Result<(), NetError> {
        if response.status() != StatusCode::SWITCHING_PROTOCOLS {
            return Err(NetError::WsUpgradeRejected {
                status: response.status().as_u16(),
            });
        }

        let headers = response.headers();
        let upgrade = headers
            .get(http::header::UPGRADE)
            .and_then(|v| v.to_str().ok())
            .ok_or(NetError::WsMissingHeader("Upgrade"))?;
        if !upgrade.eq_ignore_ascii_case("websocket") {
            return Err(NetError::InvalidHttpResponse(format!(
                "Upgrade header must be 'websocket', got '{}'",
                upgrade
            )));
        }

        let connection = headers
            .get(http::header::CONNECTION)
            .and_then(|v| v.to_str().ok())
            .ok_or(NetError::WsMissingHeader("Connection"))?;
        if !connection
            .split(',')
            .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
        {
            return Err(NetError::InvalidHttpResponse(format!(
                "Connection header must contain 'Upgrade', got '{}'",
                connection
            )));
        }

        let accept = headers
            .get(http::header::SEC_WEBSOCKET_ACCEPT)
            .and_then(|v| v.to_str().ok())
            .ok_or(NetError::WsMissingHeader("Sec-WebSocket-Accept"))?;
        let expected = compute_accept_key(&self.key);
        if accept.trim() != expected {
            return Err(NetError::WsAcceptMismatch {
                expected,
                actual: accept.to_string(),
            });
        }

        Ok(())
    }
}

/// Outcome of a successful handshake.
#[derive(Debug)]
pub struct HandshakeResult {
    /// Negotiated `Sec-WebSocket-Version`.
    pub version: u8,
    /// Parsed response head.
    pub response: Response<()>,
    /// Raw response head, terminator included.
    pub raw_response: Bytes,
    /// Bytes received after the head; the start of the frame stream.
    pub trailing: Bytes,
}

/// Send the upgrade request and read the response head.
///
/// On return the connection is positioned at the first byte after the
/// header block; bytes of that stream that arrived early are in
/// [`HandshakeResult::trailing`].
pub async fn perform_handshake<S>(
    socket: &mut S,
    mut handshake: ClientHandshake,
    options: &ReadOptions,
) -> Result<HandshakeResult, NetError>
where
    S: StreamSocket + ?Sized,
{
    let request = handshake.request_bytes();
    tracing::info!("Sending websocket handshake to {}", handshake.url);
    tracing::debug!("Handshake: {}", String::from_utf8_lossy(&request));
    write_all(socket, &request, options).await?;

    tracing::info!("Receiving server response...");
    // Resume each scan just before the previous end so a split terminator is found
    let mut scanned = 0usize;
    let acc = read_until(socket, options, |buf| {
        let from = scanned.saturating_sub(3);
        scanned = buf.len();
        find_header_end(&buf[from..]).is_some()
    })
    .await?;
    handshake.response.extend_from_slice(&acc.data);

    let end = match find_header_end(&handshake.response) {
        Some(end) => end,
        None => {
            tracing::debug!(
                "Stream closed after {} bytes without end of headers",
                handshake.response.len()
            );
            return Err(NetError::ResponseHeadersTruncated);
        }
    };

    let mut raw = handshake.response.split();
    let head = raw.split_to(end).freeze();
    let trailing = raw.freeze();
    tracing::info!("Server response: {}", String::from_utf8_lossy(&head).trim_end());

    let response = parse_response_head(&head)?;
    handshake.validate_response(&response)?;

    if !trailing.is_empty() {
        tracing::debug!("{} bytes of frame data arrived with the handshake", trailing.len());
    }

    Ok(HandshakeResult {
        version: handshake.version,
        response,
        raw_response: head,
        trailing,
    })
}

/// Parse an HTTP/1.x response head (status line and headers).
///
/// Only the status line must be UTF-8; header values are taken as raw
/// bytes, so obs-text in unrelated headers is accepted.
pub fn parse_response_head(head: &[u8]) -> Result<Response<()>, NetError> {
    let mut lines = head
        .split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line));

    let status_line = lines
        .next()
        .filter(|l| !l.is_empty())
        .ok_or_else(|| NetError::InvalidHttpResponse("empty status line".into()))?;
    let status_line = std::str::from_utf8(status_line)
        .map_err(|_| NetError::InvalidHttpResponse("status line is not UTF-8".into()))?;
    let mut parts = status_line.splitn(3, ' ');
    let version = match parts.next() {
        Some("HTTP/1.1") => Version::HTTP_11,
        Some("HTTP/1.0") => Version::HTTP_10,
        other => {
            return Err(NetError::InvalidHttpResponse(format!(
                "unsupported protocol {:?}",
                other.unwrap_or_default()
            )))
        }
    };
    let status = parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .and_then(|code| StatusCode::from_u16(code).ok())
        .ok_or_else(|| NetError::InvalidHttpResponse(format!("bad status line {:?}", status_line)))?;

    let mut builder = Response::builder().status(status).version(version);
    for line in lines.take_while(|l| !l.is_empty()) {
        let colon = line.iter().position(|&b| b == b':').ok_or_else(|| {
            NetError::InvalidHttpResponse(format!(
                "bad header line {:?}",
                String::from_utf8_lossy(line)
            ))
        })?;
        let (name, value) = (trim_ows(&line[..colon]), trim_ows(&line[colon + 1..]));
        let name = HeaderName::from_bytes(name).map_err(|_| {
            NetError::InvalidHttpResponse(format!(
                "bad header name {:?}",
                String::from_utf8_lossy(name)
            ))
        })?;
        let value = HeaderValue::from_bytes(value)
            .map_err(|_| NetError::InvalidHttpResponse(format!("bad header value for {}", name)))?;
        builder = builder.header(name, value);
    }

    builder
        .body(())
        .map_err(|e| NetError::InvalidHttpResponse(e.to_string()))
}

/// Strip optional whitespace (SP / HTAB) from both ends.
fn trim_ows(bytes: &[u8]) -> &[u8] {
    let is_ows = |b: &u8| *b == b' ' || *b == b'\t';
    let start = bytes.iter().position(|b| !is_ows(b)).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !is_ows(b)).map_or(start, |i| i + 1);
    &bytes[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handshake() -> ClientHandshake {
        ClientHandshake::new(&Url::parse("ws://127.0.0.1:8080/chat?room=1").unwrap()).unwrap()
    }

    fn accepting_response(key: &str) -> Response<()> {
        Response::builder()
            .status(101)
            .header("Upgrade", "websocket")
            .header("Connection", "Upgrade")
            .header("Sec-WebSocket-Accept", compute_accept_key(key))
            .body(())
            .unwrap()
    }

    #[test]
    fn test_compute_accept_key_rfc_vector() {
        assert_eq!(
            compute_accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn test_request_bytes() {
        let hs = handshake().header("Authorization", "Bearer token");
        let request = String::from_utf8(hs.request_bytes()).unwrap();

        assert!(request.starts_with("GET /chat?room=1 HTTP/1.1\r\n"));
        assert!(request.contains("Host: 127.0.0.1:8080\r\n"));
        assert!(request.contains("Upgrade: websocket\r\n"));
        assert!(request.contains("Connection: Upgrade\r\n"));
        assert!(request.contains(&format!("Sec-WebSocket-Key: {}\r\n", hs.key())));
        assert!(request.contains("Sec-WebSocket-Version: 13\r\n"));
        assert!(request.ends_with("Authorization: Bearer token\r\n\r\n"));
    }

    #[test]
    fn test_invalid_header_dropped() {
        let hs = handshake().header("X-Evil", "a\r\nInjected: yes");
        let request = String::from_utf8(hs.request_bytes()).unwrap();
        assert!(!request.contains("Injected"));
    }

    #[test]
    fn test_key_is_random_16_bytes() {
        let a = handshake();
        let b = handshake();
        assert_ne!(a.key(), b.key());
        let raw = base64::engine::general_purpose::STANDARD
            .decode(a.key())
            .unwrap();
        assert_eq!(raw.len(), 16);
    }

    #[test]
    fn test_validate_accepts_matching_response() {
        let hs = handshake();
        assert!(hs.validate_response(&accepting_response(hs.key())).is_ok());
    }

    #[test]
    fn test_validate_rejects_wrong_status() {
        let hs = handshake();
        let resp = Response::builder().status(200).body(()).unwrap();
        assert!(matches!(
            hs.validate_response(&resp),
            Err(NetError::WsUpgradeRejected { status: 200 })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_accept() {
        let hs = handshake();
        let resp = accepting_response("some-other-key");
        assert!(matches!(
            hs.validate_response(&resp),
            Err(NetError::WsAcceptMismatch { .. })
        ));
    }

    #[test]
    fn test_validate_requires_upgrade_header() {
        let hs = handshake();
        let resp = Response::builder()
            .status(101)
            .header("Connection", "Upgrade")
            .header("Sec-WebSocket-Accept", compute_accept_key(hs.key()))
            .body(())
            .unwrap();
        assert!(matches!(
            hs.validate_response(&resp),
            Err(NetError::WsMissingHeader("Upgrade"))
        ));
    }

    #[test]
    fn test_connection_header_token_list() {
        let hs = handshake();
        let resp = Response::builder()
            .status(101)
            .header("Upgrade", "WebSocket")
            .header("Connection", "keep-alive, Upgrade")
            .header("Sec-WebSocket-Accept", compute_accept_key(hs.key()))
            .body(())
            .unwrap();
        assert!(hs.validate_response(&resp).is_ok());
    }

    #[test]
    fn test_parse_response_head() {
        let head = b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n";
        let resp = parse_response_head(head).unwrap();
        assert_eq!(resp.status(), StatusCode::SWITCHING_PROTOCOLS);
        assert_eq!(resp.version(), Version::HTTP_11);
        assert_eq!(resp.headers()["upgrade"], "websocket");
    }

    #[test]
    fn test_parse_response_head_obs_text_value() {
        let hs = handshake();
        let mut head = format!(
            "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Accept: {}\r\n",
            compute_accept_key(hs.key())
        )
        .into_bytes();
        head.extend_from_slice(b"Server: caf\xe9\r\n\r\n");

        let resp = parse_response_head(&head).unwrap();
        assert_eq!(resp.headers()["server"].as_bytes(), b"caf\xe9");
        assert!(hs.validate_response(&resp).is_ok());
    }

    #[test]
    fn test_parse_response_head_non_utf8_status_line() {
        assert!(matches!(
            parse_response_head(b"HTTP/1.1 101 Sw\xffitching\r\n\r\n"),
            Err(NetError::InvalidHttpResponse(_))
        ));
    }

    #[test]
    fn test_parse_response_head_garbage() {
        assert!(parse_response_head(b"garbage\r\n\r\n").is_err());
        assert!(parse_response_head(b"HTTP/1.1 abc OK\r\n\r\n").is_err());
        assert!(parse_response_head(b"HTTP/1.1 101 OK\r\nNoColon\r\n\r\n").is_err());
    }
}
