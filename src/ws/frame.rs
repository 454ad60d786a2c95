//! WebSocket frame codec.
//!
//! Thin layer over tungstenite's RFC 6455 frame encoding. Only single,
//! unfragmented text frames carry data; a close frame is surfaced so the
//! session can end, and any other opcode is a protocol error for this
//! client.

use crate::base::neterror::NetError;
use bytes::{Buf, Bytes, BytesMut};
use std::io::Cursor;
use tokio_tungstenite::tungstenite::protocol::frame::coding::{Control, Data, OpCode};
use tokio_tungstenite::tungstenite::protocol::frame::{Frame as WireFrame, FrameHeader};

/// The only `Sec-WebSocket-Version` this client speaks.
pub const WS_VERSION: u8 = 13;

/// Frame type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Text,
    /// Peer-initiated close; payload is the raw status code and reason.
    Close,
}

/// One logical message: type tag plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    kind: FrameType,
    payload: Bytes,
}

impl Frame {
    /// Create a text frame.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: FrameType::Text,
            payload: Bytes::from(text.into()),
        }
    }

    pub fn kind(&self) -> FrameType {
        self.kind
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload as UTF-8, if it is valid UTF-8.
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}

/// Encoder/decoder bound to a negotiated protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCodec {
    version: u8,
    max_payload: Option<usize>,
}

impl FrameCodec {
    pub fn new(version: u8) -> Result<Self, NetError> {
        if version != WS_VERSION {
            return Err(NetError::WsProtocolError(format!(
                "unsupported protocol version {}",
                version
            )));
        }
        Ok(Self {
            version,
            max_payload: None,
        })
    }

    /// Reject frames whose declared payload exceeds `limit`.
    ///
    /// Checked against the header, before any payload is buffered.
    pub fn with_max_payload(mut self, limit: Option<usize>) -> Self {
        self.max_payload = limit;
        self
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn max_payload(&self) -> Option<usize> {
        self.max_payload
    }

    /// Serialize `frame` as a client frame (final, masked with a fresh key).
    pub fn encode(&self, frame: &Frame) -> Result<Vec<u8>, NetError> {
        let opcode = match frame.kind {
            FrameType::Text => OpCode::Data(Data::Text),
            FrameType::Close => OpCode::Control(Control::Close),
        };
        let mut wire = WireFrame::message(frame.payload.to_vec(), opcode, true);
        wire.header_mut().mask = Some(masking_key()?);

        let mut out = Vec::with_capacity(wire.len());
        wire.format(&mut out)
            .map_err(|e| NetError::WsProtocolError(e.to_string()))?;
        Ok(out)
    }

    /// Parse one frame off the front of `buf`.
    ///
    /// Returns `Ok(None)` and leaves `buf` untouched while the frame is
    /// incomplete. Masked frames are unmasked.
    pub fn decode(&self, buf: &mut BytesMut) -> Result<Option<Frame>, NetError> {
        let mut cursor = Cursor::new(&buf[..]);
        let (header, length) = match FrameHeader::parse(&mut cursor)
            .map_err(|e| NetError::WsProtocolError(e.to_string()))?
        {
            Some(parsed) => parsed,
            None => return Ok(None),
        };
        if header.rsv1 || header.rsv2 || header.rsv3 {
            return Err(NetError::WsProtocolError(
                "reserved bits set without a negotiated extension".into(),
            ));
        }
        let header_len = cursor.position() as usize;
        if let Some(limit) = self.max_payload {
            if length > limit as u64 {
                return Err(NetError::MsgTooBig { limit });
            }
        }
        let length = usize::try_from(length).map_err(|_| NetError::MsgTooBig {
            limit: usize::MAX,
        })?;
        if buf.len() - header_len < length {
            return Ok(None);
        }

        buf.advance(header_len);
        let mut payload = buf.split_to(length);
        if let Some(mask) = header.mask {
            for (i, byte) in payload.iter_mut().enumerate() {
                *byte ^= mask[i & 3];
            }
        }

        if !header.is_final {
            return Err(NetError::WsProtocolError(
                "fragmented messages are not supported".into(),
            ));
        }
        match header.opcode {
            OpCode::Data(Data::Text) => Ok(Some(Frame {
                kind: FrameType::Text,
                payload: payload.freeze(),
            })),
            OpCode::Control(Control::Close) => Ok(Some(Frame {
                kind: FrameType::Close,
                payload: payload.freeze(),
            })),
            other => Err(NetError::WsProtocolError(format!(
                "unsupported frame type {}",
                other
            ))),
        }
    }
}

fn masking_key() -> Result<[u8; 4], NetError> {
    let mut key = [0u8; 4];
    boring::rand::rand_bytes(&mut key).map_err(|_| NetError::SslProtocolError)?;
    Ok(key)
}
