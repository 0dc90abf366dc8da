//! Bridge Client
//!
//! A minimal client for the bridge socket. It writes request frames and
//! reads response frames; matching responses to requests by session is left
//! to the caller, since the server may answer out of order.

use crate::protocol::{frame, Envelope, FrameError, ResponseEnvelope};
use serde_json::{Map, Value};
use std::path::Path;
use thiserror::Error;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;

/// Errors returned by [`Client`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("invalid response: {0}")]
    Json(#[from] serde_json::Error),

    /// The server closed the connection
    #[error("connection closed by server")]
    Closed,
}

/// A connection to the bridge.
#[derive(Debug)]
pub struct Client {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
}

impl Client {
    /// Connects to the bridge socket at `path`.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let stream = UnixStream::connect(path).await?;
        Ok(Self::from_stream(stream))
    }

    /// Wraps an already connected stream.
    pub fn from_stream(stream: UnixStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self { reader, writer }
    }

    /// Sends a request without waiting for its response.
    pub async fn send(&mut self, envelope: &Envelope) -> Result<(), ClientError> {
        self.send_raw(&envelope.to_json()?).await
    }

    /// Sends an arbitrary payload as one frame.
    pub async fn send_raw(&mut self, payload: &[u8]) -> Result<(), ClientError> {
        frame::write_frame(&mut self.writer, payload).await?;
        Ok(())
    }

    /// Reads the next response, whichever request it answers.
    pub async fn recv(&mut self) -> Result<ResponseEnvelope, ClientError> {
        match frame::read_frame(&mut self.reader).await? {
            Some(payload) => Ok(ResponseEnvelope::parse(&payload)?),
            None => Err(ClientError::Closed),
        }
    }

    /// Sends one request and waits for the next response.
    ///
    /// Only meaningful when no other request is in flight.
    pub async fn call(
        &mut self,
        session: &str,
        command: &str,
        params: Map<String, Value>,
    ) -> Result<ResponseEnvelope, ClientError> {
        self.send(&Envelope::new(session, command, params)).await?;
        self.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_and_recv() {
        let (client_side, mut server_side) = UnixStream::pair().unwrap();
        let mut client = Client::from_stream(client_side);

        client
            .send(&Envelope::new("s1", "frobnicate", Map::new()))
            .await
            .unwrap();

        let payload = frame::read_frame(&mut server_side).await.unwrap().unwrap();
        assert_eq!(&payload[..], br#"["s1","frobnicate",{}]"#);

        let response = ResponseEnvelope::failure("s1", "nope");
        frame::write_frame(&mut server_side, &response.to_json().unwrap())
            .await
            .unwrap();
        assert_eq!(client.recv().await.unwrap(), response);
    }

    #[tokio::test]
    async fn test_recv_after_server_close() {
        let (client_side, server_side) = UnixStream::pair().unwrap();
        let mut client = Client::from_stream(client_side);
        drop(server_side);

        assert!(matches!(client.recv().await, Err(ClientError::Closed)));
    }
}
