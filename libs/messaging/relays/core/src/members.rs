//! # Member Registry
//!
//! Tracks connected clients by connection id, with a secondary identity
//! index keyed by (name, origin address). Both maps are updated together in
//! every mutating call, so a lookup through either always agrees.

use crate::common::error::RegistryError;
use crate::types::{ConnectionId, Member};
use std::collections::HashMap;
use tracing::debug;

/// Connected members of the relay
#[derive(Debug, Default)]
pub struct MemberRegistry {
    members: HashMap<ConnectionId, Member>,
    identities: HashMap<(String, String), ConnectionId>,
}

impl MemberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly accepted connection with no name
    pub fn add_by_accept(
        &mut self,
        connection_id: ConnectionId,
        origin_address: impl Into<String>,
    ) -> Result<&Member, RegistryError> {
        use std::collections::hash_map::Entry;

        match self.members.entry(connection_id) {
            Entry::Occupied(_) => Err(RegistryError::ConnectionExists(connection_id)),
            Entry::Vacant(slot) => {
                let member = slot.insert(Member::new(connection_id, origin_address));
                debug!(connection_id, origin = %member.origin_address, "Member added");
                Ok(member)
            }
        }
    }

    /// Set the name of an unnamed member
    ///
    /// Fails without changing anything if the name is empty, the connection
    /// is unknown or already named, or another member holds the same
    /// (name, origin address) pair.
    pub fn announce_name(
        &mut self,
        connection_id: ConnectionId,
        name: &str,
    ) -> Result<(), RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }

        let member = self
            .members
            .get_mut(&connection_id)
            .ok_or(RegistryError::UnknownConnection(connection_id))?;

        if let Some(existing) = &member.name {
            return Err(RegistryError::AlreadyNamed {
                connection_id,
                name: existing.clone(),
            });
        }

        let key = (name.to_string(), member.origin_address.clone());
        if self.identities.contains_key(&key) {
            return Err(RegistryError::DuplicateName {
                name: key.0,
                address: key.1,
            });
        }

        member.name = Some(name.to_string());
        self.identities.insert(key, connection_id);
        Ok(())
    }

    pub fn find_by_socket(&self, connection_id: ConnectionId) -> Option<&Member> {
        self.members.get(&connection_id)
    }

    pub fn find_by_name_and_address(&self, name: &str, address: &str) -> Option<&Member> {
        self.identities
            .get(&(name.to_string(), address.to_string()))
            .and_then(|id| self.members.get(id))
    }

    /// Remove a member and its identity entry
    pub fn remove(&mut self, connection_id: ConnectionId) -> Option<Member> {
        let member = self.members.remove(&connection_id)?;
        if let Some(name) = &member.name {
            self.identities
                .remove(&(name.clone(), member.origin_address.clone()));
        }
        Some(member)
    }

    /// Names of announced members, oldest connection first
    pub fn list_names(&self) -> Vec<String> {
        self.list()
            .into_iter()
            .filter_map(|m| m.name.clone())
            .collect()
    }

    /// All members, oldest connection first
    pub fn list(&self) -> Vec<&Member> {
        let mut members: Vec<&Member> = self.members.values().collect();
        members.sort_by_key(|m| m.connection_id);
        members
    }

    pub fn iter(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn named_count(&self) -> usize {
        self.identities.len()
    }
}
