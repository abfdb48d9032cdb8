//! # Client Connection Management
//!
//! Handles individual client connections with bidirectional communication.
//! Each connection spawns a read task and a write task; neither touches the
//! registries.
//!
//! ## Task Structure
//! - **Read Task**: decodes frames → `RelayEvent::Frame` to the coordinator;
//!   on EOF, error, timeout or oversize frame sends one
//!   `RelayEvent::Disconnected` and exits
//! - **Write Task**: drains the bounded outbound queue onto the socket; once
//!   the coordinator drops the `Peer`, it flushes what is queued and shuts
//!   the socket down
//!
//! Dropping a `Peer` aborts its read task, so a connection closed by the
//! coordinator produces no further events.

use crate::common::error::{RelayError, Result};
use crate::types::ConnectionId;
use codec::Frame;
use network::{read_frame, write_frame, FrameLimits, TransportError};
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Events sent from connection tasks to the coordinator
#[derive(Debug)]
pub enum RelayEvent {
    Frame {
        connection_id: ConnectionId,
        frame: Frame,
    },
    Disconnected {
        connection_id: ConnectionId,
        error: TransportError,
    },
}

/// Per-connection settings
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    pub limits: FrameLimits,
    pub outbound_queue_size: usize,
}

/// Coordinator-side handle to one connection
pub struct Peer {
    outbound: mpsc::Sender<Frame>,
    capacity: usize,
    reader: Option<JoinHandle<()>>,
}

impl Peer {
    /// A peer with no socket; frames queued for it land in the returned
    /// receiver
    pub fn detached(capacity: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (outbound, rx) = mpsc::channel(capacity);
        (
            Self {
                outbound,
                capacity,
                reader: None,
            },
            rx,
        )
    }

    /// Queue a frame without waiting
    ///
    /// A full queue rejects this one frame; the connection stays up.
    pub fn send(&self, frame: Frame) -> Result<()> {
        self.outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => RelayError::ResourceExhausted {
                resource: "outbound queue",
                limit: self.capacity,
            },
            mpsc::error::TrySendError::Closed(_) => {
                RelayError::Transport(TransportError::closed())
            }
        })
    }
}

impl Drop for Peer {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

/// Start the read and write tasks for an accepted connection
pub fn spawn_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    connection_id: ConnectionId,
    events: mpsc::Sender<RelayEvent>,
    settings: ConnectionSettings,
) -> Peer {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(connection_id, "Failed to set TCP_NODELAY: {}", e);
    }

    let (mut read_half, mut write_half) = stream.into_split();
    let (outbound, mut outbound_rx) = mpsc::channel::<Frame>(settings.outbound_queue_size);

    // Reading task: forward decoded frames to the coordinator
    let reader = tokio::spawn(async move {
        let mut read_count = 0u64;

        loop {
            match read_frame(&mut read_half, &settings.limits).await {
                Ok(frame) => {
                    read_count += 1;
                    debug!(connection_id, peer = %peer_addr, frame = %frame, "Frame received");
                    let event = RelayEvent::Frame {
                        connection_id,
                        frame,
                    };
                    if events.send(event).await.is_err() {
                        break;
                    }
                }
                Err(error) => {
                    let _ = events
                        .send(RelayEvent::Disconnected {
                            connection_id,
                            error,
                        })
                        .await;
                    break;
                }
            }
        }

        debug!(
            connection_id,
            "📤 Connection read task ended after {} frames", read_count
        );
    });

    // Writing task: send queued frames to this connection
    tokio::spawn(async move {
        let mut write_count = 0u64;

        while let Some(frame) = outbound_rx.recv().await {
            if let Err(e) = write_frame(&mut write_half, &frame).await {
                warn!(connection_id, peer = %peer_addr, "Failed to write to connection: {}", e);
                break;
            }
            write_count += 1;
        }

        if let Err(e) = write_half.shutdown().await {
            debug!(connection_id, "Error shutting down connection: {}", e);
        }
        info!(
            connection_id,
            peer = %peer_addr,
            "📥 Connection write task ended after {} frames", write_count
        );
    });

    Peer {
        outbound,
        capacity: settings.outbound_queue_size,
        reader: Some(reader),
    }
}
