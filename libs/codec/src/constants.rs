//! # Protocol Constants - Mail Relay Wire Format
//!
//! ## Purpose
//!
//! Central registry of protocol-level constants shared by the relay server,
//! the demo client and the transport layer. These values define the wire
//! format and must stay stable for compatibility with existing clients.
//!
//! ## Architecture Role
//!
//! ```text
//! relay-config → [Protocol Constants] → Frame encoding / envelope checks
//!      ↑                  ↓                        ↓
//! Defaults          Header layout            Size limits
//! Port / banner     Tag + length             Body length
//! ```

/// Size of the frame header: 1-byte type tag + 4-byte big-endian length
pub const FRAME_HEADER_SIZE: usize = 5;

/// Default maximum frame payload size (2KB)
///
/// Receivers reject larger declared lengths before allocating.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 2048;

/// Hard ceiling for a configurable frame size (16MB)
pub const MAX_CONFIGURABLE_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Maximum mail body length in characters
pub const MAX_BODY_CHARS: usize = 80;

/// Default TCP port of the relay
pub const DEFAULT_PORT: u16 = 5945;

/// Placeholder used when a queued mail has no sender snapshot
pub const UNKNOWN_SENDER: &str = "unknown";

/// Client-side command that ends a session
pub const QUIT_COMMAND: &str = "close";

/// Error text sent when a (name, address) pair is already connected
pub const DUPLICATE_NAME_MESSAGE: &str =
    "user with same username already connected from this machine.";

/// Default welcome banner for a given port
pub fn default_banner(port: u16) -> String {
    format!("Welcome to the mail relay, running on port {}.", port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banner_mentions_port() {
        assert_eq!(
            default_banner(DEFAULT_PORT),
            "Welcome to the mail relay, running on port 5945."
        );
    }
}
