//! Mail envelope parsing and delivery text formatting
//!
//! An envelope is the `user@ipv4 body` text carried by an
//! `EMAIL_MSG_TO_SERVER` frame. The demo client validates with the same
//! rules before sending, so both ends agree on what a well-formed mail is.

use crate::constants::UNKNOWN_SENDER;
use crate::error::EnvelopeError;
use std::net::Ipv4Addr;

/// A validated mail envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Recipient name, never empty, never containing a space
    pub user: String,
    /// Recipient address as written by the sender; always a valid IPv4 literal
    pub address: String,
    /// Message text, at most `max_body_chars` characters
    pub body: String,
}

impl Envelope {
    /// Parse `user@ipv4 body`
    ///
    /// The first space ends the address; everything after it is the body,
    /// spaces included. A space before the `@` means the user name itself
    /// contains one.
    pub fn parse(text: &str, max_body_chars: usize) -> Result<Self, EnvelopeError> {
        let space = text.find(' ').ok_or(EnvelopeError::MissingSpace)?;
        let at = text.find('@').ok_or(EnvelopeError::MissingAt)?;

        if space < at {
            return Err(EnvelopeError::UserContainsSpace);
        }

        let user = &text[..at];
        if user.is_empty() {
            return Err(EnvelopeError::EmptyUser);
        }

        let address = &text[at + 1..space];
        if address.parse::<Ipv4Addr>().is_err() {
            return Err(EnvelopeError::InvalidAddress(address.to_string()));
        }

        let body = &text[space + 1..];
        let len = body.chars().count();
        if len > max_body_chars {
            return Err(EnvelopeError::BodyTooLong {
                len,
                max: max_body_chars,
            });
        }

        Ok(Self {
            user: user.to_string(),
            address: address.to_string(),
            body: body.to_string(),
        })
    }

    /// Render back to wire text
    pub fn to_wire(&self) -> String {
        format!("{}@{} {}", self.user, self.address, self.body)
    }
}

/// Format a delivered mail as `From: sender@address\nbody`
///
/// Missing sender fields render as `unknown`.
pub fn format_delivery(sender_name: Option<&str>, sender_address: Option<&str>, body: &str) -> String {
    format!(
        "From: {}@{}\n{}",
        sender_name.unwrap_or(UNKNOWN_SENDER),
        sender_address.unwrap_or(UNKNOWN_SENDER),
        body
    )
}
