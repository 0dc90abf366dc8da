//! Length-Prefixed Frame Codec
//!
//! Every message on the socket, in both directions, is a frame:
//!
//! ```text
//! ┌───────────────────────┬──────────────────────────────┐
//! │ length (u16, BE)      │ payload (length bytes)       │
//! └───────────────────────┴──────────────────────────────┘
//! ```
//!
//! The payload is opaque to this module. Its maximum size is bounded by the
//! 16-bit header, so a single frame never exceeds 65537 bytes on the wire.
//!
//! Two decoding styles are provided:
//!
//! - [`decode`] works over a receive buffer and returns `None` until a whole
//!   frame is available. The connection handler uses it the same way a
//!   streaming parser would: append socket data, try to decode, advance.
//! - [`read_frame`] pulls exactly one frame from an `AsyncRead`, blocking
//!   until it is complete. The client uses it.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of the length header in bytes
pub const HEADER_LEN: usize = 2;

/// Largest payload a frame can carry
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// Errors produced while encoding or reading frames.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The payload does not fit in the 16-bit length header
    #[error("payload too large: {size} bytes (max: {max})")]
    Oversized { size: usize, max: usize },

    /// The underlying stream failed or ended in the middle of a frame
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Encodes a payload into a frame.
///
/// Returns [`FrameError::Oversized`] instead of truncating when the payload
/// is longer than [`MAX_PAYLOAD`]. Nothing is produced in that case.
pub fn encode(payload: &[u8]) -> Result<Bytes, FrameError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::Oversized {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }

    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_u16(payload.len() as u16);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Attempts to decode one frame from the front of `buf`.
///
/// # Returns
///
/// - `Some((payload, consumed))` - a complete frame; `consumed` bytes should
///   be dropped from the buffer
/// - `None` - the header or the payload is still incomplete
pub fn decode(buf: &[u8]) -> Option<(Bytes, usize)> {
    if buf.len() < HEADER_LEN {
        return None;
    }

    let len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
    let total = HEADER_LEN + len;
    if buf.len() < total {
        return None;
    }

    Some((Bytes::copy_from_slice(&buf[HEADER_LEN..total]), total))
}

/// Reads exactly one frame from `reader`.
///
/// A clean end of stream before the first header byte returns `Ok(None)`.
/// An end of stream anywhere else is reported as an
/// [`std::io::ErrorKind::UnexpectedEof`] I/O error.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Bytes>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];

    // Read the first byte separately so a clean close can be told apart
    // from a truncated header.
    if reader.read(&mut header[..1]).await? == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut header[1..]).await?;

    let len = u16::from_be_bytes(header) as usize;
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;

    Ok(Some(Bytes::from(payload)))
}

/// Encodes `payload` and writes the whole frame to `writer`, then flushes.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode(payload)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}
