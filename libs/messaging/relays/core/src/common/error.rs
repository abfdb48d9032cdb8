//! # Relay Error Types
//!
//! Error handling for the mail relay coordinator. Registry errors reject a
//! single request; only `Setup` is fatal to the process.

use crate::types::ConnectionId;
use network::TransportError;
use thiserror::Error;

/// Member registry rejections
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Another live member already holds this (name, address) pair
    #[error("user {name} already connected from {address}")]
    DuplicateName { name: String, address: String },

    /// The connection announced a name before
    #[error("connection {connection_id} is already named {name}")]
    AlreadyNamed {
        connection_id: ConnectionId,
        name: String,
    },

    #[error("user name cannot be empty")]
    EmptyName,

    #[error("no member for connection {0}")]
    UnknownConnection(ConnectionId),

    #[error("connection {0} is already registered")]
    ConnectionExists(ConnectionId),
}

/// Relay operation errors
#[derive(Error, Debug)]
pub enum RelayError {
    /// Setup and initialization errors
    #[error("Setup error: {0}")]
    Setup(String),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// A bounded resource is full; the single operation is rejected
    #[error("Resource exhausted: {resource} (limit {limit})")]
    ResourceExhausted { resource: &'static str, limit: usize },

    /// Transport layer errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// IO errors from tokio operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_name_message() {
        let err = RelayError::from(RegistryError::DuplicateName {
            name: "bob".into(),
            address: "10.0.0.1".into(),
        });
        assert_eq!(
            err.to_string(),
            "Registry error: user bob already connected from 10.0.0.1"
        );
    }
}
