//! # Relay Record Types
//!
//! ## Purpose
//! Records held by the two registries: a `Member` per live connection and a
//! `Mail` per queued, undelivered message.
//!
//! ## Architecture Role
//! ```text
//! accept → Member (unnamed) → USER_NAME → Member (named)
//!                                             ↑ matched by (name, address)
//! EMAIL_MSG_TO_SERVER → Mail ──── drain pass ─┘ → EMAIL_MSG_TO_CLIENT
//! ```
//!
//! Mail carries a snapshot of its sender taken at enqueue time, so it stays
//! deliverable after the sender disconnects.

use codec::format_delivery;
use std::fmt;
use std::time::Instant;

/// Unique identifier for client connections
pub type ConnectionId = u64;

/// Process-unique mail identifier, never reused within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MailId(pub u64);

impl fmt::Display for MailId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Server-side record of one connected client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub connection_id: ConnectionId,
    /// Absent until the client announces it
    pub name: Option<String>,
    /// Peer IP as text, fixed at accept time
    pub origin_address: String,
    pub connected_at: Instant,
}

impl Member {
    pub fn new(connection_id: ConnectionId, origin_address: impl Into<String>) -> Self {
        Self {
            connection_id,
            name: None,
            origin_address: origin_address.into(),
            connected_at: Instant::now(),
        }
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}@{}", name, self.origin_address),
            None => write!(f, "<unnamed>@{}", self.origin_address),
        }
    }
}

/// One queued message awaiting a matching connected recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub id: MailId,
    pub recipient_name: String,
    pub recipient_address: String,
    pub sender_name: Option<String>,
    pub sender_address: Option<String>,
    pub body: String,
    pub queued_at: Instant,
}

impl Mail {
    /// Payload of the `EMAIL_MSG_TO_CLIENT` frame for this mail
    pub fn delivery_text(&self) -> String {
        format_delivery(
            self.sender_name.as_deref(),
            self.sender_address.as_deref(),
            &self.body,
        )
    }
}
