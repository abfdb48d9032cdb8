//! Transport Layer
//!
//! Framed stream transport for the mail relay protocol.

pub mod tcp;


pub use tcp::{read_frame, write_frame, FrameLimits, TcpConnection, TcpConnectionStats};
