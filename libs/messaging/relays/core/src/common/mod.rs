//! # Mail Relay Engine - Connection Multiplexer
//!
//! This module provides the coordinator of the relay:
//! - `Multiplexer` owning the member and mailbox registries outright
//! - the per-connection protocol state machine
//! - the run loop multiplexing listener, connections, timer and console
//!
//! ## Architecture Role
//!
//! ```text
//!  TcpListener ──accept──┐
//!  read tasks ──events───┤
//!  DeliveryScheduler ────┼──► Multiplexer ──► MemberRegistry
//!  console lines ────────┘        │      └──► MailboxRegistry
//!                                 └──► Peer outbound queues ──► write tasks
//! ```
//!
//! Every registry mutation happens on the coordinator's task, one event at a
//! time, so no locks are needed.
//!
//! ## Connection States
//!
//! `Connected-Unnamed` → (`USER_NAME`) → `Connected-Named` → `Closed`.
//! `EMAIL_MSG_TO_SERVER` is accepted in either named state. `CLOSE_CON`, a
//! failed read, a read timeout, an oversize frame or a duplicate identity
//! closes the connection and removes its member. Anything else is ignored.

pub mod client;
pub mod error;

use crate::common::client::{spawn_connection, ConnectionSettings, Peer, RelayEvent};
use crate::common::error::{RegistryError, RelayError, Result};
use crate::console::{render_listing, ConsoleCommand, USAGE};
use crate::mailbox::MailboxRegistry;
use crate::members::MemberRegistry;
use crate::scheduler::DeliveryScheduler;
use crate::types::ConnectionId;
use codec::{Envelope, Frame, FrameType, DUPLICATE_NAME_MESSAGE};
use network::{FrameLimits, TransportError};
use relay_config::RelayConfig;
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Capacity of the channel carrying connection events to the coordinator
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Pause after a failed accept so a persistent error (EMFILE) cannot spin the loop
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Counters reported by the coordinator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub connections_accepted: u64,
    pub connections_rejected: u64,
    pub frames_received: u64,
    pub mails_queued: u64,
    pub mails_rejected: u64,
    pub mails_delivered: u64,
    pub delivery_passes: u64,
}

/// Bind the relay listener
///
/// Failure here is fatal to the relay.
pub async fn bind(config: &RelayConfig) -> Result<TcpListener> {
    let address = config.listen_address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|e| RelayError::Setup(format!("Failed to bind {}: {}", address, e)))?;
    info!("✅ Relay listening on: {}", address);
    Ok(listener)
}

/// The coordinator: owns both registries and every connection handle
pub struct Multiplexer {
    config: RelayConfig,
    banner: String,
    members: MemberRegistry,
    mailbox: MailboxRegistry,
    peers: HashMap<ConnectionId, Peer>,
    next_connection_id: ConnectionId,
    events_tx: mpsc::Sender<RelayEvent>,
    events_rx: mpsc::Receiver<RelayEvent>,
    stats: RelayStats,
}

impl Multiplexer {
    pub fn new(config: RelayConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            banner: config.banner(),
            mailbox: MailboxRegistry::new(config.delivery.max_pending),
            members: MemberRegistry::new(),
            peers: HashMap::new(),
            next_connection_id: 1,
            events_tx,
            events_rx,
            stats: RelayStats::default(),
            config,
        }
    }

    pub fn members(&self) -> &MemberRegistry {
        &self.members
    }

    pub fn mailbox(&self) -> &MailboxRegistry {
        &self.mailbox
    }

    pub fn stats(&self) -> &RelayStats {
        &self.stats
    }

    fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            limits: FrameLimits {
                max_frame_size: self.config.limits.max_frame_size,
                read_timeout: self.config.frame_read_timeout(),
            },
            outbound_queue_size: self.config.limits.outbound_queue_size,
        }
    }

    /// Reserve the id for the next connection
    pub fn allocate_connection_id(&mut self) -> ConnectionId {
        let id = self.next_connection_id;
        self.next_connection_id += 1;
        id
    }

    /// Handle a freshly accepted socket
    pub fn handle_accept(&mut self, stream: TcpStream, peer_addr: SocketAddr) {
        let connection_id = self.allocate_connection_id();
        let peer = spawn_connection(
            stream,
            peer_addr,
            connection_id,
            self.events_tx.clone(),
            self.connection_settings(),
        );

        if let Err(e) = self.admit(connection_id, &peer_addr.ip().to_string(), peer) {
            warn!(connection_id, peer = %peer_addr, "Connection rejected: {}", e);
        }
    }

    /// Register a connection and greet it
    ///
    /// At `max_connections` live members the peer gets `SERVER_ERROR` and is
    /// dropped, which closes it once the error is flushed.
    pub fn admit(
        &mut self,
        connection_id: ConnectionId,
        origin_address: &str,
        peer: Peer,
    ) -> Result<()> {
        let limit = self.config.server.max_connections;
        if self.members.len() >= limit {
            self.stats.connections_rejected += 1;
            let _ = peer.send(Frame::text(
                FrameType::ServerError,
                "server is at its connection limit, try again later.",
            ));
            return Err(RelayError::ResourceExhausted {
                resource: "connections",
                limit,
            });
        }

        self.members.add_by_accept(connection_id, origin_address)?;
        if let Err(e) = peer.send(Frame::text(FrameType::Welcome, self.banner.clone())) {
            warn!(connection_id, "Failed to queue welcome: {}", e);
        }
        self.peers.insert(connection_id, peer);
        self.stats.connections_accepted += 1;

        info!(
            connection_id,
            peer = %origin_address,
            "🔗 Connection accepted ({} live)",
            self.members.len()
        );
        Ok(())
    }

    /// Dispatch one event from a connection task
    pub fn handle_event(&mut self, event: RelayEvent) {
        match event {
            RelayEvent::Frame {
                connection_id,
                frame,
            } => self.handle_frame(connection_id, frame),
            RelayEvent::Disconnected {
                connection_id,
                error,
            } => {
                match &error {
                    e if e.is_clean_close() => {
                        debug!(connection_id, "Peer closed the connection")
                    }
                    TransportError::Protocol(e) => {
                        warn!(connection_id, "Protocol violation, closing: {}", e)
                    }
                    e => warn!(connection_id, category = e.category(), "Connection lost: {}", e),
                }
                self.disconnect(connection_id);
            }
        }
    }

    /// Apply one inbound frame to the connection's state
    pub fn handle_frame(&mut self, connection_id: ConnectionId, frame: Frame) {
        if self.members.find_by_socket(connection_id).is_none() {
            debug!(connection_id, frame = %frame, "Frame for closed connection ignored");
            return;
        }
        self.stats.frames_received += 1;

        match frame.frame_type() {
            Ok(FrameType::UserName) => self.handle_user_name(connection_id, &frame.payload_text()),
            Ok(FrameType::EmailToServer) => self.handle_email(connection_id, &frame.payload_text()),
            Ok(FrameType::CloseConnection) => {
                info!(connection_id, "👋 Client requested close");
                self.disconnect(connection_id);
            }
            Ok(other) => {
                warn!(connection_id, frame_type = %other, "Unexpected frame type from client, ignored");
            }
            Err(e) => {
                warn!(connection_id, "Ignoring frame: {}", e);
            }
        }
    }

    fn handle_user_name(&mut self, connection_id: ConnectionId, name: &str) {
        match self.members.announce_name(connection_id, name) {
            Ok(()) => {
                info!(connection_id, user = %name, "👤 User announced");
            }
            Err(RegistryError::DuplicateName { name, address }) => {
                warn!(connection_id, "User {} already connected from {}", name, address);
                self.send_to(
                    connection_id,
                    Frame::text(FrameType::ServerError, DUPLICATE_NAME_MESSAGE),
                );
                self.disconnect(connection_id);
            }
            Err(e) => {
                warn!(connection_id, "Name announcement rejected: {}", e);
                self.send_to(
                    connection_id,
                    Frame::text(FrameType::ServerError, format!("{}.", e)),
                );
            }
        }
    }

    fn handle_email(&mut self, connection_id: ConnectionId, text: &str) {
        let envelope = match Envelope::parse(text, self.config.limits.max_body_chars) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(connection_id, "Dropping mail: {}", e);
                self.stats.mails_rejected += 1;
                return;
            }
        };

        let sender = self.members.find_by_socket(connection_id);
        match self
            .mailbox
            .enqueue(envelope.user, envelope.address, sender, envelope.body)
        {
            Ok(id) => {
                self.stats.mails_queued += 1;
                info!(
                    connection_id,
                    mail = %id,
                    "📨 Mail queued ({}/{} pending)",
                    self.mailbox.len(),
                    self.mailbox.max_pending()
                );
            }
            Err(e) => {
                self.stats.mails_rejected += 1;
                warn!(connection_id, "Dropping mail: {}", e);
            }
        }
    }

    fn send_to(&self, connection_id: ConnectionId, frame: Frame) {
        match self.peers.get(&connection_id) {
            Some(peer) => {
                if let Err(e) = peer.send(frame) {
                    warn!(connection_id, "Dropping outbound frame: {}", e);
                }
            }
            None => debug!(connection_id, "No peer for outbound frame"),
        }
    }

    /// Remove a connection's member and close its socket
    pub fn disconnect(&mut self, connection_id: ConnectionId) {
        let member = self.members.remove(connection_id);
        let peer = self.peers.remove(&connection_id);

        if let Some(member) = member {
            info!(
                connection_id,
                "🔗 Connection closed: {} ({} live)",
                member,
                self.members.len()
            );
        }
        drop(peer);
    }

    /// Deliver every queued mail whose recipient is connected
    pub fn run_delivery_pass(&mut self) -> usize {
        let peers = &self.peers;
        let delivered = self.mailbox.drain_deliverable(&self.members, |mail, recipient| {
            let frame = Frame::text(FrameType::EmailToClient, mail.delivery_text());
            match peers.get(&recipient.connection_id) {
                Some(peer) => {
                    if let Err(e) = peer.send(frame) {
                        warn!(
                            connection_id = recipient.connection_id,
                            mail = %mail.id,
                            "Delivery dropped: {}", e
                        );
                    }
                }
                None => warn!(mail = %mail.id, "No peer for recipient {}", recipient),
            }
        });

        self.stats.delivery_passes += 1;
        self.stats.mails_delivered += delivered as u64;
        if delivered > 0 {
            info!("📬 Delivered {} mails ({} pending)", delivered, self.mailbox.len());
        }
        delivered
    }

    /// Apply one console line; returns text for the operator, if any
    pub fn handle_console(&self, line: &str) -> Option<String> {
        match ConsoleCommand::parse(line) {
            ConsoleCommand::List => Some(render_listing(&self.members, &self.mailbox)),
            ConsoleCommand::Help => Some(USAGE.to_string()),
            ConsoleCommand::Empty => None,
            ConsoleCommand::Unknown(cmd) => {
                Some(format!("error: invalid command '{}'.\n{}", cmd, USAGE))
            }
        }
    }

    /// Serve until the console reaches end of input
    ///
    /// Accept errors are logged and the loop continues after a short pause.
    /// Console bytes that are not UTF-8 are replaced, never fatal.
    pub async fn run<R>(&mut self, listener: TcpListener, mut console: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut scheduler = DeliveryScheduler::new(self.config.delivery_interval());
        // Partial reads stay in `line` if another arm wins the select
        let mut line = Vec::new();

        info!(
            "🚀 Mail relay running on {} (delivery every {:?})",
            listener.local_addr()?,
            scheduler.period()
        );

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => self.handle_accept(stream, peer_addr),
                    Err(e) => accept_failed(e).await,
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event),
                _ = scheduler.tick() => {
                    self.run_delivery_pass();
                }
                read = console.read_until(b'\n', &mut line) => {
                    if read? == 0 {
                        info!("Console closed, shutting down after {} delivery passes", scheduler.passes());
                        return Ok(());
                    }
                    let output = {
                        let text = String::from_utf8_lossy(&line);
                        self.handle_console(text.trim_end_matches(['\r', '\n']))
                    };
                    if let Some(output) = output {
                        println!("{}", output);
                    }
                    line.clear();
                }
            }
        }
    }
}

async fn accept_failed(e: io::Error) {
    error!("Failed to accept connection: {}", e);
    tokio::time::sleep(ACCEPT_BACKOFF).await;
}
