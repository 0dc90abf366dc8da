//! Response Writer
//!
//! Every request on a connection runs in its own task, so several tasks
//! may finish at the same moment and all want to write. The [`Responder`]
//! owns the write half behind an async mutex; a frame is written and
//! flushed completely while the lock is held, so two frames never
//! interleave on the wire.
//!
//! The responder also carries the connection's close signal. A task that
//! cannot write, or that received a payload it cannot answer, raises it and
//! the connection's reader loop stops.

use super::handler::{ConnectionError, ConnectionStats};
use crate::protocol::{frame, FrameError, ResponseEnvelope};
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, trace, warn};

/// Serializes response frames onto one connection.
#[derive(Debug)]
pub struct Responder<W> {
    /// Connection id (for logging)
    conn: u64,
    /// Write half of the connection
    writer: Mutex<W>,
    /// Raised when the connection must be torn down
    closed: Notify,
    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl<W> Responder<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(conn: u64, writer: W, stats: Arc<ConnectionStats>) -> Self {
        Self {
            conn,
            writer: Mutex::new(writer),
            closed: Notify::new(),
            stats,
        }
    }

    /// Encodes `response` and writes it as one frame.
    ///
    /// A response too large for a frame is replaced by an error response
    /// with the same session. A write failure, or a session too long for
    /// even that error response, raises the close signal.
    pub async fn send(&self, response: &ResponseEnvelope) -> Result<(), ConnectionError> {
        let frame = match frame::encode(&response.to_json()?) {
            Ok(frame) => frame,
            Err(FrameError::Oversized { size, max }) => {
                warn!(
                    conn = self.conn,
                    session = %response.session,
                    size,
                    "Response exceeds frame limit, sending error instead"
                );
                let fallback = ResponseEnvelope::failure(
                    response.session.clone(),
                    format!("response too large: {} bytes (max: {})", size, max),
                );
                match frame::encode(&fallback.to_json()?) {
                    Ok(frame) => frame,
                    Err(e) => {
                        // No correlated response fits in a frame.
                        warn!(conn = self.conn, "Error response exceeds frame limit, closing connection");
                        self.close();
                        return Err(e.into());
                    }
                }
            }
            Err(e) => return Err(e.into()),
        };

        let mut writer = self.writer.lock().await;
        let written = match writer.write_all(&frame).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            debug!(conn = self.conn, error = %e, "Write failed, closing connection");
            drop(writer);
            self.close();
            return Err(e.into());
        }

        self.stats.bytes_written(frame.len());
        trace!(
            conn = self.conn,
            session = %response.session,
            bytes = frame.len(),
            "Sent response"
        );
        Ok(())
    }

    /// Asks the connection to shut down.
    pub fn close(&self) {
        self.closed.notify_one();
    }

    /// Completes once [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        self.closed.notified().await;
    }
}
