//! # Frame Codec - Length-Prefixed Wire Packets
//!
//! ## Purpose
//!
//! Encodes and decodes the relay's wire packet: a 1-byte type tag, a 4-byte
//! big-endian payload length, then `length` bytes of payload (absent when the
//! length is zero). This module works on byte buffers only; the async socket
//! side lives in the `network` crate.
//!
//! ## Wire Layout
//!
//! ```text
//! +--------+-----------------+----------------------+
//! | type:1 | length:4 (BE)   | payload: length bytes|
//! +--------+-----------------+----------------------+
//! ```
//!
//! ## Size Limits
//!
//! Every decoder takes a `max_payload` bound. The declared length is checked
//! against it as soon as the header is available, so an oversize frame is
//! rejected before any payload buffer is allocated.

use crate::constants::FRAME_HEADER_SIZE;
use crate::error::{ProtocolError, ProtocolResult};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use num_enum::TryFromPrimitive;
use std::fmt;

/// Protocol frame types
///
/// The numeric values are the on-wire type tags and must never change.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
pub enum FrameType {
    /// Server → client banner sent right after accept
    Welcome = 0,
    /// Client → server name announcement
    UserName = 1,
    /// Client → server mail envelope (`user@ipv4 body`)
    EmailToServer = 2,
    /// Server → client delivered mail (`From: sender@ip\nbody`)
    EmailToClient = 3,
    /// Client → server graceful disconnect, empty payload
    CloseConnection = 4,
    /// Server → client error text
    ServerError = 5,
}

impl FrameType {
    /// Protocol name of this frame type, used in logs
    pub fn name(&self) -> &'static str {
        match self {
            FrameType::Welcome => "WELCOME",
            FrameType::UserName => "USER_NAME",
            FrameType::EmailToServer => "EMAIL_MSG_TO_SERVER",
            FrameType::EmailToClient => "EMAIL_MSG_TO_CLIENT",
            FrameType::CloseConnection => "CLOSE_CON",
            FrameType::ServerError => "SERVER_ERROR",
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoded 5-byte frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub tag: u8,
    pub length: u32,
}

impl FrameHeader {
    /// Parse a header from its 5 raw bytes
    pub fn from_bytes(raw: [u8; FRAME_HEADER_SIZE]) -> Self {
        Self {
            tag: raw[0],
            length: u32::from_be_bytes([raw[1], raw[2], raw[3], raw[4]]),
        }
    }

    /// Reject declared lengths above `max_payload`
    pub fn check_length(&self, max_payload: usize) -> ProtocolResult<usize> {
        let length = self.length as usize;
        if length > max_payload {
            return Err(ProtocolError::frame_too_large(length, max_payload, self.tag));
        }
        Ok(length)
    }
}

/// One protocol unit exchanged over the stream
///
/// The raw tag is kept rather than a `FrameType` so that frames with tags
/// outside the protocol still decode and can be ignored by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    tag: u8,
    payload: Bytes,
}

impl Frame {
    /// Build a frame of a known type
    pub fn new(frame_type: FrameType, payload: impl Into<Bytes>) -> Self {
        Self {
            tag: frame_type as u8,
            payload: payload.into(),
        }
    }

    /// Build a frame carrying UTF-8 text
    pub fn text(frame_type: FrameType, text: impl Into<String>) -> Self {
        Self::new(frame_type, Bytes::from(text.into()))
    }

    /// Build a frame with an empty payload
    pub fn empty(frame_type: FrameType) -> Self {
        Self::new(frame_type, Bytes::new())
    }

    /// Build a frame from a raw tag, known or not
    pub fn from_raw(tag: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            tag,
            payload: payload.into(),
        }
    }

    /// Raw type tag as received
    pub fn tag(&self) -> u8 {
        self.tag
    }

    /// Frame type, if the tag is part of the protocol
    pub fn frame_type(&self) -> ProtocolResult<FrameType> {
        FrameType::try_from(self.tag).map_err(|_| ProtocolError::UnknownFrameType { tag: self.tag })
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload decoded as text
    ///
    /// C clients send `strlen + 1` bytes; trailing NULs are stripped here.
    /// Invalid UTF-8 is replaced.
    pub fn payload_text(&self) -> String {
        let end = self
            .payload
            .iter()
            .rposition(|b| *b != 0)
            .map(|i| i + 1)
            .unwrap_or(0);
        String::from_utf8_lossy(&self.payload[..end]).into_owned()
    }

    /// Total encoded size in bytes
    pub fn encoded_len(&self) -> usize {
        FRAME_HEADER_SIZE + self.payload.len()
    }

    /// Encode header and payload into one buffer
    pub fn encode(&self) -> ProtocolResult<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Append the encoded frame to `buf`
    pub fn encode_into(&self, buf: &mut BytesMut) -> ProtocolResult<()> {
        let length = u32::try_from(self.payload.len()).map_err(|_| {
            ProtocolError::PayloadUnencodable {
                size: self.payload.len(),
            }
        })?;
        buf.reserve(self.encoded_len());
        buf.put_u8(self.tag);
        buf.put_u32(length);
        if length > 0 {
            buf.put_slice(&self.payload);
        }
        Ok(())
    }

    /// Decode one frame from the front of `data`
    ///
    /// Returns the frame and the number of bytes consumed. A buffer that does
    /// not yet hold a whole frame yields `ProtocolError::Incomplete`; callers
    /// reading from a stream keep reading and retry.
    pub fn decode(data: &[u8], max_payload: usize) -> ProtocolResult<(Frame, usize)> {
        if data.len() < FRAME_HEADER_SIZE {
            return Err(ProtocolError::incomplete(FRAME_HEADER_SIZE, data.len()));
        }

        let mut raw = [0u8; FRAME_HEADER_SIZE];
        raw.copy_from_slice(&data[..FRAME_HEADER_SIZE]);
        let header = FrameHeader::from_bytes(raw);
        let length = header.check_length(max_payload)?;

        let total = FRAME_HEADER_SIZE + length;
        if data.len() < total {
            return Err(ProtocolError::incomplete(total, data.len()));
        }

        let payload = Bytes::copy_from_slice(&data[FRAME_HEADER_SIZE..total]);
        Ok((Frame::from_raw(header.tag, payload), total))
    }

    /// Decode and consume one frame from a growable buffer
    ///
    /// Returns `Ok(None)` while the buffer holds only part of a frame.
    pub fn decode_buf(buf: &mut BytesMut, max_payload: usize) -> ProtocolResult<Option<Frame>> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let mut raw = [0u8; FRAME_HEADER_SIZE];
        raw.copy_from_slice(&buf[..FRAME_HEADER_SIZE]);
        let header = FrameHeader::from_bytes(raw);
        let length = header.check_length(max_payload)?;

        if buf.len() < FRAME_HEADER_SIZE + length {
            buf.reserve(FRAME_HEADER_SIZE + length - buf.len());
            return Ok(None);
        }

        buf.advance(FRAME_HEADER_SIZE);
        let payload = buf.split_to(length).freeze();
        Ok(Some(Frame::from_raw(header.tag, payload)))
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.frame_type() {
            Ok(t) => write!(f, "{} ({} bytes)", t, self.payload.len()),
            Err(_) => write!(f, "tag {} ({} bytes)", self.tag, self.payload.len()),
        }
    }
}
