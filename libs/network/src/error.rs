//! Transport Error Types
//!
//! Error handling for framed TCP transport. Every variant ends the
//! connection it occurred on; callers only need to decide how loudly to log it.

use codec::ProtocolError;
use thiserror::Error;

/// Main transport error type
#[derive(Error, Debug)]
pub enum TransportError {
    /// Peer closed the stream, cleanly or in the middle of a frame
    #[error("Connection closed by peer{}", close_suffix(.mid_frame))]
    ConnectionClosed { mid_frame: bool },

    /// A started frame did not complete in time
    #[error("Timeout error: {operation} exceeded {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Frame violated the wire protocol
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Generic I/O errors
    #[error("I/O error: {message}")]
    Io {
        message: String,
        source: std::io::Error,
    },
}

fn close_suffix(mid_frame: &bool) -> &'static str {
    if *mid_frame {
        " mid-frame"
    } else {
        ""
    }
}

/// Result type alias for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

impl TransportError {
    /// Create a clean-close error
    pub fn closed() -> Self {
        Self::ConnectionClosed { mid_frame: false }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Create an I/O error with context
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// True for an orderly close at a frame boundary
    pub fn is_clean_close(&self) -> bool {
        matches!(self, TransportError::ConnectionClosed { mid_frame: false })
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            TransportError::ConnectionClosed { .. } => "closed",
            TransportError::Timeout { .. } => "timeout",
            TransportError::Protocol(_) => "protocol",
            TransportError::Io { .. } => "io",
        }
    }
}

/// Convert standard I/O errors to transport errors
impl From<std::io::Error> for TransportError {
    fn from(error: std::io::Error) -> Self {
        if error.kind() == std::io::ErrorKind::UnexpectedEof {
            return TransportError::ConnectionClosed { mid_frame: true };
        }
        TransportError::Io {
            message: error.to_string(),
            source: error,
        }
    }
}
