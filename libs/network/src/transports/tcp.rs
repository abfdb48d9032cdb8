//! TCP Network Transport Implementation
//!
//! Length-prefixed frame I/O over tokio streams. `read_frame` and
//! `write_frame` work on any `AsyncRead`/`AsyncWrite`, so the relay can use
//! them on split socket halves and tests can use in-memory pipes.
//! `TcpConnection` wraps a whole `TcpStream` for single-owner clients.

use crate::{Result, TransportError};
use codec::{Frame, FrameHeader, DEFAULT_MAX_FRAME_SIZE, FRAME_HEADER_SIZE};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Limits applied to every inbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLimits {
    /// Largest accepted payload; larger declared lengths are rejected unread
    pub max_frame_size: usize,
    /// Time allowed for the rest of a frame once its first byte arrived
    pub read_timeout: Duration,
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            read_timeout: Duration::from_secs(10),
        }
    }
}

/// Read one frame, waiting as long as needed for it to start
///
/// Waiting for the type byte is unbounded so idle peers are never dropped.
/// Once it arrives, the rest of the header and the payload must follow within
/// `limits.read_timeout`. Partial reads are retried until the declared byte
/// count is satisfied.
///
/// Not cancel-safe: dropping the future mid-frame loses the bytes already
/// consumed. Call it from a task that does nothing else.
pub async fn read_frame<R>(reader: &mut R, limits: &FrameLimits) -> Result<Frame>
where
    R: AsyncRead + Unpin,
{
    let mut tag = [0u8; 1];
    if reader.read(&mut tag).await? == 0 {
        return Err(TransportError::closed());
    }

    let timeout_ms = limits.read_timeout.as_millis() as u64;
    tokio::time::timeout(limits.read_timeout, read_frame_rest(reader, tag[0], limits))
        .await
        .map_err(|_| TransportError::timeout("read frame", timeout_ms))?
}

async fn read_frame_rest<R>(reader: &mut R, tag: u8, limits: &FrameLimits) -> Result<Frame>
where
    R: AsyncRead + Unpin,
{
    let mut raw = [0u8; FRAME_HEADER_SIZE];
    raw[0] = tag;
    reader.read_exact(&mut raw[1..]).await?;

    let header = FrameHeader::from_bytes(raw);
    let length = header.check_length(limits.max_frame_size)?;

    let mut payload = vec![0u8; length];
    if length > 0 {
        reader.read_exact(&mut payload).await?;
    }

    Ok(Frame::from_raw(header.tag, payload))
}

/// Write one frame as a single buffer and flush it
///
/// Returns the number of bytes written.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let encoded = frame.encode()?;
    writer
        .write_all(&encoded)
        .await
        .map_err(|e| TransportError::io("Failed to write frame", e))?;
    writer
        .flush()
        .await
        .map_err(|e| TransportError::io("Failed to flush TCP stream", e))?;
    Ok(encoded.len())
}

/// TCP connection wrapper with traffic statistics
pub struct TcpConnection {
    stream: TcpStream,
    peer_addr: SocketAddr,
    limits: FrameLimits,
    connected_at: Instant,
    last_activity: Instant,
    bytes_sent: u64,
    bytes_received: u64,
    frames_sent: u64,
    frames_received: u64,
}

impl TcpConnection {
    /// Wrap an already connected stream
    pub fn new(stream: TcpStream, peer_addr: SocketAddr, limits: FrameLimits) -> Self {
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }

        let now = Instant::now();
        Self {
            stream,
            peer_addr,
            limits,
            connected_at: now,
            last_activity: now,
            bytes_sent: 0,
            bytes_received: 0,
            frames_sent: 0,
            frames_received: 0,
        }
    }

    /// Connect to a relay
    pub async fn connect(addr: SocketAddr, limits: FrameLimits) -> Result<Self> {
        info!("Connecting to TCP peer at {}", addr);

        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| TransportError::io(format!("Failed to connect to {}", addr), e))?;

        info!("Successfully connected to TCP peer at {}", addr);
        Ok(Self::new(stream, addr, limits))
    }

    /// Send one frame
    pub async fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        let written = write_frame(&mut self.stream, frame).await?;

        self.bytes_sent += written as u64;
        self.frames_sent += 1;
        self.last_activity = Instant::now();

        debug!(
            peer = %self.peer_addr,
            frame = %frame,
            total_sent = self.bytes_sent,
            "Sent frame over TCP"
        );
        Ok(())
    }

    /// Receive one frame
    pub async fn receive_frame(&mut self) -> Result<Frame> {
        let frame = read_frame(&mut self.stream, &self.limits).await?;

        self.bytes_received += frame.encoded_len() as u64;
        self.frames_received += 1;
        self.last_activity = Instant::now();

        debug!(
            peer = %self.peer_addr,
            frame = %frame,
            total_received = self.bytes_received,
            "Received frame over TCP"
        );
        Ok(frame)
    }

    /// Get connection statistics
    pub fn stats(&self) -> TcpConnectionStats {
        TcpConnectionStats {
            peer_addr: self.peer_addr,
            connected_duration: self.connected_at.elapsed(),
            last_activity: self.last_activity.elapsed(),
            bytes_sent: self.bytes_sent,
            bytes_received: self.bytes_received,
            frames_sent: self.frames_sent,
            frames_received: self.frames_received,
        }
    }

    /// Split into independently owned halves for concurrent read and write
    pub fn into_split(self) -> (OwnedReadHalf, OwnedWriteHalf) {
        self.stream.into_split()
    }
}

/// TCP connection statistics
#[derive(Debug, Clone)]
pub struct TcpConnectionStats {
    pub peer_addr: SocketAddr,
    pub connected_duration: Duration,
    pub last_activity: Duration,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub frames_sent: u64,
    pub frames_received: u64,
}
