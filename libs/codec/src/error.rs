//! Protocol-level errors for frame and envelope processing
//!
//! Provides error handling for the mail relay codec with enough context to
//! log a useful diagnostic. Frame errors decide whether a connection can keep
//! going; envelope errors only ever drop the single offending mail.

use thiserror::Error;

/// Frame decoding errors with diagnostic context
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer does not yet hold a complete frame
    #[error("Incomplete frame: need {need} bytes, got {got}")]
    Incomplete { need: usize, got: usize },

    /// Declared payload length exceeds the configured limit
    #[error("Frame too large: {size} bytes exceeds maximum {max} (type tag {frame_type})")]
    FrameTooLarge {
        size: usize,
        max: usize,
        frame_type: u8,
    },

    /// Type tag is not part of the protocol
    #[error("Unknown frame type {tag}: valid types are 0-5")]
    UnknownFrameType { tag: u8 },

    /// Payload cannot be encoded because its length does not fit the header
    #[error("Payload of {size} bytes cannot be encoded in a 32-bit length field")]
    PayloadUnencodable { size: usize },

    /// Mail envelope failed validation
    #[error("Invalid envelope: {0}")]
    Envelope(#[from] EnvelopeError),
}

impl ProtocolError {
    /// Create an Incomplete error
    pub fn incomplete(need: usize, got: usize) -> Self {
        Self::Incomplete { need, got }
    }

    /// Create a FrameTooLarge error
    pub fn frame_too_large(size: usize, max: usize, frame_type: u8) -> Self {
        Self::FrameTooLarge {
            size,
            max,
            frame_type,
        }
    }

    /// True when the stream can no longer be trusted to stay in sync
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::FrameTooLarge { .. } | Self::PayloadUnencodable { .. }
        )
    }
}

/// Reasons a `user@ipv4 body` envelope is rejected
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("no space separator between address and message")]
    MissingSpace,

    #[error("no '@' separator between user and address")]
    MissingAt,

    #[error("user name cannot contain spaces")]
    UserContainsSpace,

    #[error("no user name before '@'")]
    EmptyUser,

    #[error("invalid IPv4 address '{0}'")]
    InvalidAddress(String),

    #[error("message body is {len} characters, limit is {max}")]
    BodyTooLong { len: usize, max: usize },
}

/// Result type for protocol operations
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;
