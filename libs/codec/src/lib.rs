//! # Mail Relay Protocol Codec
//!
//! ## Purpose
//!
//! The "Rules" layer of the mail relay: everything about what bytes mean,
//! nothing about where they come from.
//! - Frame type registry and the length-prefixed frame encoding
//! - Incremental frame decoding with size limits enforced from the header
//! - `user@ipv4 body` envelope validation shared by server and client
//! - Delivery text formatting
//! - Protocol constants and error types
//!
//! ## Architecture Role
//!
//! ```text
//! relay-core → [codec] → network/
//!     ↑           ↓          ↓
//! Registries  Frame rules  Sockets
//! Delivery    Envelopes    read_exact
//! ```
//!
//! ## What This Crate Does NOT Contain
//! - Network transport logic (belongs in network/)
//! - Connection or registry state (belongs in relay-core)

pub mod constants;
pub mod envelope;
pub mod error;
pub mod frame;

pub use constants::*;
pub use envelope::{format_delivery, Envelope};
pub use error::{EnvelopeError, ProtocolError, ProtocolResult};
pub use frame::{Frame, FrameHeader, FrameType};
