//! Connection Handler Module
//!
//! This module handles individual client connections.
//! Each client gets its own reader task that pulls frames off the socket
//! and spawns one task per frame, so a slow request never blocks the
//! requests behind it.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (accept on the Unix socket)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Read bytes from socket  │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │      ┌──────────────────────┐
//!    │  │ Decode complete frames  │─┼─────>│ request task         │
//!    │  └───────────┬─────────────┘ │spawn │ parse → execute →    │
//!    │              ▼               │      │ Responder::send      │
//!    │         [Loop back]          │      └──────────────────────┘
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. Client disconnects / error / close signal
//!        │
//!        ▼
//! 5. In-flight requests drained (clean close) or aborted (error)
//! ```
//!
//! ## Buffer Management
//!
//! Incoming data accumulates in a `BytesMut` buffer because a read may
//! return half a frame, or several frames at once.

use super::responder::Responder;
use crate::commands::{error_chain, CommandHandler};
use crate::protocol::{frame, Envelope, FrameError, ResponseEnvelope};
use bytes::{Bytes, BytesMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, trace, warn};

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total requests answered
    pub requests_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new connection and returns its id.
    pub fn connection_opened(&self) -> u64 {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.connections_accepted.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn request_processed(&self) {
        self.requests_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Handles a single client connection.
///
/// The handler owns the read half; the write half lives in a shared
/// [`Responder`] that every request task writes through.
pub struct ConnectionHandler {
    /// Connection id (for logging)
    id: u64,

    /// Read half of the Unix stream
    reader: OwnedReadHalf,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// Shared writer for responses
    responder: Arc<Responder<OwnedWriteHalf>>,

    /// The command handler (shared across connections)
    command_handler: CommandHandler,

    /// Requests currently in flight on this connection
    tasks: JoinSet<()>,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The accepted Unix stream
    /// * `command_handler` - The command handler for executing commands
    /// * `stats` - Shared connection statistics
    pub fn new(
        stream: UnixStream,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        let id = stats.connection_opened();
        let (reader, writer) = stream.into_split();

        Self {
            id,
            reader,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            responder: Arc::new(Responder::new(id, writer, Arc::clone(&stats))),
            command_handler,
            tasks: JoinSet::new(),
            stats,
        }
    }

    /// Returns the connection id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Runs the connection until the client goes away or an error occurs.
    ///
    /// After a clean end of stream, requests already in flight still get
    /// their responses. After any error they are aborted.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(conn = self.id, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => {
                self.drain().await;
                info!(conn = self.id, "Client disconnected gracefully");
            }
            Err(e) => {
                self.tasks.abort_all();
                match e {
                    ConnectionError::Closed => {
                        debug!(conn = self.id, "Connection closed by request task")
                    }
                    ConnectionError::IoError(io_err)
                        if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
                    {
                        debug!(conn = self.id, "Connection reset by client")
                    }
                    _ => warn!(conn = self.id, error = %e, "Connection error"),
                }
            }
        }

        self.stats.connection_closed();
        result
    }

    /// The main read-decode-spawn loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            while let Some(payload) = self.try_parse_frame() {
                self.spawn_request(payload);
            }

            // Ensure we have some capacity
            if self.buffer.capacity() - self.buffer.len() < 1024 {
                self.buffer.reserve(INITIAL_BUFFER_SIZE);
            }

            tokio::select! {
                read = self.reader.read_buf(&mut self.buffer) => {
                    let n = read?;
                    if n == 0 {
                        // Connection closed by client
                        return if self.buffer.is_empty() {
                            Ok(())
                        } else {
                            // Partial frame in buffer
                            Err(ConnectionError::UnexpectedEof)
                        };
                    }
                    self.stats.bytes_read(n);
                    trace!(conn = self.id, bytes = n, "Read data");
                }
                Some(joined) = self.tasks.join_next() => {
                    log_join(self.id, joined);
                }
                _ = self.responder.closed() => {
                    return Err(ConnectionError::Closed);
                }
            }
        }
    }

    /// Attempts to decode a frame from the buffer.
    fn try_parse_frame(&mut self) -> Option<Bytes> {
        let (payload, consumed) = frame::decode(&self.buffer)?;
        let _ = self.buffer.split_to(consumed);
        debug!(
            conn = self.id,
            len = payload.len(),
            remaining = self.buffer.len(),
            "Received frame"
        );
        Some(payload)
    }

    /// Schedules a frame for processing without waiting for it.
    fn spawn_request(&mut self, payload: Bytes) {
        let id = self.id;
        let handler = self.command_handler.clone();
        let responder = Arc::clone(&self.responder);
        let stats = Arc::clone(&self.stats);

        self.tasks.spawn(async move {
            process_request(id, payload, handler, responder, stats).await;
        });
    }

    /// Waits for in-flight requests, unless the connection gets closed.
    async fn drain(&mut self) {
        loop {
            tokio::select! {
                joined = self.tasks.join_next() => match joined {
                    Some(joined) => log_join(self.id, joined),
                    None => return,
                },
                _ = self.responder.closed() => {
                    self.tasks.abort_all();
                    return;
                }
            }
        }
    }
}

/// Parses, executes, and answers one frame.
async fn process_request(
    conn: u64,
    payload: Bytes,
    handler: CommandHandler,
    responder: Arc<Responder<OwnedWriteHalf>>,
    stats: Arc<ConnectionStats>,
) {
    let response = match Envelope::parse(&payload) {
        Ok(envelope) => {
            trace!(conn, session = %envelope.session, command = %envelope.command, "Dispatching");
            handler.execute(envelope).await
        }
        Err(e) => match e.session() {
            Some(session) => {
                warn!(conn, session, error = %e, "Malformed envelope");
                ResponseEnvelope::failure(session, format!("protocol error: {}", error_chain(&e)))
            }
            None => {
                warn!(conn, error = %e, "Malformed envelope without session, closing connection");
                responder.close();
                return;
            }
        },
    };

    stats.request_processed();
    if let Err(e) = responder.send(&response).await {
        debug!(conn, session = %response.session, error = %e, "Failed to send response");
    }
}

fn log_join(conn: u64, joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!(conn, error = %e, "Request task panicked");
        }
    }
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (socket issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Frame could not be encoded
    #[error("Frame error: {0}")]
    FrameError(#[from] FrameError),

    /// Response could not be serialized
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Unexpected end of stream (partial frame)
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// A request task asked for the connection to close
    #[error("Connection closed")]
    Closed,
}

/// Handles a client connection.
///
/// This is a convenience function that creates a ConnectionHandler
/// and runs it to completion.
///
/// # Arguments
///
/// * `stream` - The accepted Unix stream
/// * `command_handler` - The command handler for executing commands
/// * `stats` - Shared connection statistics
pub async fn handle_connection(
    stream: UnixStream,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
) {
    let handler = ConnectionHandler::new(stream, command_handler, stats);
    let id = handler.id();
    if let Err(e) = handler.run().await {
        debug!(conn = id, error = %e, "Connection ended with error");
    }
}
