//! # Mail Relay Core Infrastructure
//!
//! Store-and-forward relay components: the member and mailbox registries,
//! the delivery scheduler, per-connection tasks, the operator console and
//! the `Multiplexer` that ties them together on one coordinating task.

pub mod common;
pub mod console;
pub mod mailbox;
pub mod members;
pub mod scheduler;
pub mod types;

// Re-export commonly used types
pub use common::client::{spawn_connection, ConnectionSettings, Peer, RelayEvent};
pub use common::error::{RegistryError, RelayError, Result};
pub use common::{bind, Multiplexer, RelayStats};
pub use console::{render_listing, ConsoleCommand};
pub use mailbox::MailboxRegistry;
pub use members::MemberRegistry;
pub use scheduler::DeliveryScheduler;
pub use types::{ConnectionId, Mail, MailId, Member};
