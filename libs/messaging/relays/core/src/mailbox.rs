//! # Mailbox Registry
//!
//! Pending mail, newest first. Mail ids come from a counter owned by the
//! registry and are never reused. Delivery is a single pass that hands every
//! mail with a live recipient to the caller and keeps the rest.

use crate::common::error::{RelayError, Result};
use crate::members::MemberRegistry;
use crate::types::{Mail, MailId, Member};
use std::collections::VecDeque;
use std::time::Instant;
use tracing::debug;

/// Queue of undelivered mail
#[derive(Debug)]
pub struct MailboxRegistry {
    /// Front is newest
    queue: VecDeque<Mail>,
    next_id: u64,
    max_pending: usize,
}

impl MailboxRegistry {
    pub fn new(max_pending: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            next_id: 1,
            max_pending,
        }
    }

    /// Queue a mail, snapshotting the sender's identity
    ///
    /// Fails with `ResourceExhausted` when `max_pending` mails are queued;
    /// the queue is left untouched.
    pub fn enqueue(
        &mut self,
        recipient_name: impl Into<String>,
        recipient_address: impl Into<String>,
        sender: Option<&Member>,
        body: impl Into<String>,
    ) -> Result<MailId> {
        if self.queue.len() >= self.max_pending {
            return Err(RelayError::ResourceExhausted {
                resource: "mail queue",
                limit: self.max_pending,
            });
        }

        let id = MailId(self.next_id);
        self.next_id += 1;

        self.queue.push_front(Mail {
            id,
            recipient_name: recipient_name.into(),
            recipient_address: recipient_address.into(),
            sender_name: sender.and_then(|m| m.name.clone()),
            sender_address: sender.map(|m| m.origin_address.clone()),
            body: body.into(),
            queued_at: Instant::now(),
        });
        Ok(id)
    }

    /// Hand every mail whose recipient is connected to `deliver`
    ///
    /// Delivered mail is removed whether or not the caller manages to send
    /// it. Returns the number delivered.
    pub fn drain_deliverable<F>(&mut self, members: &MemberRegistry, mut deliver: F) -> usize
    where
        F: FnMut(Mail, &Member),
    {
        let mut kept = VecDeque::with_capacity(self.queue.len());
        let mut delivered = 0;

        for mail in self.queue.drain(..) {
            match members.find_by_name_and_address(&mail.recipient_name, &mail.recipient_address) {
                Some(recipient) => {
                    debug!(mail = %mail.id, recipient = %recipient, "Delivering mail");
                    deliver(mail, recipient);
                    delivered += 1;
                }
                None => kept.push_back(mail),
            }
        }

        self.queue = kept;
        delivered
    }

    pub fn remove(&mut self, id: MailId) -> Option<Mail> {
        let index = self.queue.iter().position(|m| m.id == id)?;
        self.queue.remove(index)
    }

    pub fn find(&self, id: MailId) -> Option<&Mail> {
        self.queue.iter().find(|m| m.id == id)
    }

    /// Pending mail, newest first
    pub fn list(&self) -> impl Iterator<Item = &Mail> {
        self.queue.iter()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn max_pending(&self) -> usize {
        self.max_pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(members: &[(u64, &str, &str)]) -> MemberRegistry {
        let mut registry = MemberRegistry::new();
        for (id, name, addr) in members {
            registry.add_by_accept(*id, *addr).unwrap();
            registry.announce_name(*id, name).unwrap();
        }
        registry
    }

    #[test]
    fn test_ids_increase_and_list_is_newest_first() {
        let mut mailbox = MailboxRegistry::new(10);
        let a = mailbox.enqueue("bob", "10.0.0.2", None, "one").unwrap();
        let b = mailbox.enqueue("bob", "10.0.0.2", None, "two").unwrap();
        assert!(b > a);

        let bodies: Vec<&str> = mailbox.list().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["two", "one"]);
    }

    #[test]
    fn test_enqueue_then_drain_delivers_exactly_once() {
        let members = registry_with(&[(1, "alice", "10.0.0.1"), (2, "bob", "10.0.0.2")]);
        let mut mailbox = MailboxRegistry::new(10);

        let sender = members.find_by_socket(1);
        let id = mailbox.enqueue("bob", "10.0.0.2", sender, "hi").unwrap();

        let mut out = Vec::new();
        let n = mailbox.drain_deliverable(&members, |mail, member| {
            out.push((member.connection_id, mail.delivery_text()));
        });

        assert_eq!(n, 1);
        assert_eq!(out, vec![(2, "From: alice@10.0.0.1\nhi".to_string())]);
        assert!(mailbox.find(id).is_none());
        assert!(mailbox.is_empty());

        assert_eq!(mailbox.drain_deliverable(&members, |_, _| {}), 0);
    }

    #[test]
    fn test_mail_for_absent_recipient_survives_passes() {
        let mut members = registry_with(&[(1, "alice", "10.0.0.1")]);
        let mut mailbox = MailboxRegistry::new(10);
        let id = mailbox.enqueue("bob", "10.0.0.2", None, "later").unwrap();
        let before = mailbox.find(id).cloned().unwrap();

        for _ in 0..5 {
            assert_eq!(mailbox.drain_deliverable(&members, |_, _| panic!("no recipient")), 0);
        }
        assert_eq!(mailbox.find(id), Some(&before));

        // Same name from a different address is not the recipient
        members.add_by_accept(2, "10.0.0.3").unwrap();
        members.announce_name(2, "bob").unwrap();
        assert_eq!(mailbox.drain_deliverable(&members, |_, _| {}), 0);

        members.add_by_accept(3, "10.0.0.2").unwrap();
        members.announce_name(3, "bob").unwrap();
        assert_eq!(mailbox.drain_deliverable(&members, |_, m| assert_eq!(m.connection_id, 3)), 1);
    }

    #[test]
    fn test_sender_snapshot_survives_disconnect() {
        let mut members = registry_with(&[(1, "alice", "10.0.0.1"), (2, "bob", "10.0.0.2")]);
        let mut mailbox = MailboxRegistry::new(10);
        mailbox
            .enqueue("bob", "10.0.0.2", members.find_by_socket(1), "bye")
            .unwrap();

        members.remove(1);

        let mut texts = Vec::new();
        mailbox.drain_deliverable(&members, |mail, _| texts.push(mail.delivery_text()));
        assert_eq!(texts, vec!["From: alice@10.0.0.1\nbye"]);
    }

    #[test]
    fn test_unnamed_sender_snapshot() {
        let mut members = MemberRegistry::new();
        members.add_by_accept(1, "10.0.0.1").unwrap();
        let mut mailbox = MailboxRegistry::new(10);
        let id = mailbox
            .enqueue("bob", "10.0.0.2", members.find_by_socket(1), "hi")
            .unwrap();

        let mail = mailbox.find(id).unwrap();
        assert_eq!(mail.sender_name, None);
        assert_eq!(mail.sender_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(mail.delivery_text(), "From: unknown@10.0.0.1\nhi");
    }

    #[test]
    fn test_max_pending() {
        let mut mailbox = MailboxRegistry::new(2);
        assert_eq!(mailbox.max_pending(), 2);
        mailbox.enqueue("a", "10.0.0.1", None, "1").unwrap();
        mailbox.enqueue("a", "10.0.0.1", None, "2").unwrap();

        let err = mailbox.enqueue("a", "10.0.0.1", None, "3").unwrap_err();
        assert!(matches!(
            err,
            RelayError::ResourceExhausted { resource: "mail queue", limit: 2 }
        ));
        assert_eq!(mailbox.len(), 2);
    }

    #[test]
    fn test_remove_and_ids_not_reused() {
        let mut mailbox = MailboxRegistry::new(10);
        let a = mailbox.enqueue("a", "10.0.0.1", None, "1").unwrap();
        assert_eq!(mailbox.remove(a).map(|m| m.body), Some("1".to_string()));
        assert!(mailbox.remove(a).is_none());

        let b = mailbox.enqueue("a", "10.0.0.1", None, "2").unwrap();
        assert_ne!(a, b);
    }
}
