//! Network Infrastructure
//!
//! Async framing for the mail relay protocol over TCP. Byte-level encoding
//! rules live in `codec`; this crate moves frames across tokio streams with
//! `read_exact` semantics, size limits and per-frame timeouts.

pub mod error;
pub mod transports;

pub use error::{Result, TransportError};
pub use transports::{read_frame, write_frame, FrameLimits, TcpConnection, TcpConnectionStats};
