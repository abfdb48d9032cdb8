//! Operator console commands read from the relay's stdin.

use crate::mailbox::MailboxRegistry;
use crate::members::MemberRegistry;
use std::fmt::Write;

pub const USAGE: &str = "commands:\n  list   show connected members and pending mail\n  help   show this message";

const RULE: &str = "================";

/// One parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    List,
    Help,
    /// Blank line, ignored
    Empty,
    Unknown(String),
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "" => ConsoleCommand::Empty,
            "list" => ConsoleCommand::List,
            "help" => ConsoleCommand::Help,
            other => ConsoleCommand::Unknown(other.to_string()),
        }
    }
}

/// Render both registries for the `list` command
pub fn render_listing(members: &MemberRegistry, mailbox: &MailboxRegistry) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{RULE}\nList of members\n{RULE}");
    for name in members.list_names() {
        let _ = writeln!(out, "{}", name);
    }
    let _ = writeln!(out, "{RULE}");

    let _ = writeln!(out, "\n{RULE}\nList of emails\n{RULE}");
    for mail in mailbox.list() {
        let _ = writeln!(
            out,
            "Recipient name: {}\nIP: {}\nMessage Body: {}\n{RULE}",
            mail.recipient_name, mail.recipient_address, mail.body
        );
    }
    let _ = write!(out, "{RULE}");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(ConsoleCommand::parse("list\n"), ConsoleCommand::List);
        assert_eq!(ConsoleCommand::parse("  help "), ConsoleCommand::Help);
        assert_eq!(ConsoleCommand::parse("   "), ConsoleCommand::Empty);
        assert_eq!(
            ConsoleCommand::parse("quit"),
            ConsoleCommand::Unknown("quit".into())
        );
    }

    #[test]
    fn test_listing() {
        let mut members = MemberRegistry::new();
        members.add_by_accept(1, "10.0.0.1").unwrap();
        members.announce_name(1, "alice").unwrap();
        members.add_by_accept(2, "10.0.0.2").unwrap();

        let mut mailbox = MailboxRegistry::new(10);
        mailbox.enqueue("bob", "10.0.0.9", None, "first").unwrap();
        mailbox.enqueue("carol", "10.0.0.8", None, "second").unwrap();

        let listing = render_listing(&members, &mailbox);
        let expected = "\
================
List of members
================
alice
================

================
List of emails
================
Recipient name: carol
IP: 10.0.0.8
Message Body: second
================
Recipient name: bob
IP: 10.0.0.9
Message Body: first
================
================";
        assert_eq!(listing, expected);
    }
}
