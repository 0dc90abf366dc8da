//! Unix Socket Listener
//!
//! Binds the bridge socket and hands every accepted connection to its own
//! [`ConnectionHandler`](crate::connection::ConnectionHandler) task.
//!
//! The socket path comes from [`ServerConfig`]; whatever already sits at
//! that path (a socket left by a crashed process, a file, a directory) is
//! removed before binding.

use crate::commands::{CommandHandler, HttpClient};
use crate::connection::{handle_connection, ConnectionStats};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{debug, error, info, warn};

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Path of the Unix domain socket
    pub socket_path: PathBuf,
    /// Deadline for one outbound request, `None` for no limit
    pub request_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(crate::DEFAULT_SOCKET_PATH),
            request_timeout: Some(crate::DEFAULT_REQUEST_TIMEOUT),
        }
    }
}

impl ServerConfig {
    /// Creates a configuration for `socket_path` with default settings.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            ..Self::default()
        }
    }
}

/// Errors that stop the listener.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to remove stale socket {path}: {source}")]
    RemoveStale { path: PathBuf, source: io::Error },

    #[error("failed to bind {path}: {source}")]
    Bind { path: PathBuf, source: io::Error },

    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),
}

/// A bound listener ready to accept connections.
pub struct Server {
    listener: UnixListener,
    socket_path: PathBuf,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
}

impl Server {
    /// Removes any stale entry at the configured path and binds the socket.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(config: &ServerConfig, client: Arc<dyn HttpClient>) -> Result<Self, ServerError> {
        let path = &config.socket_path;

        remove_stale(path).map_err(|source| ServerError::RemoveStale {
            path: path.clone(),
            source,
        })?;

        let listener = UnixListener::bind(path).map_err(|source| ServerError::Bind {
            path: path.clone(),
            source,
        })?;

        Ok(Self {
            listener,
            socket_path: path.clone(),
            command_handler: CommandHandler::new(client).with_timeout(config.request_timeout),
            stats: Arc::new(ConnectionStats::new()),
        })
    }

    /// Returns the path the socket is bound to.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Returns the shared connection statistics.
    pub fn stats(&self) -> Arc<ConnectionStats> {
        Arc::clone(&self.stats)
    }

    /// Accepts connections until `shutdown` completes or accepting fails.
    ///
    /// The socket file is removed on the way out.
    pub async fn run<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        info!(path = %self.socket_path.display(), "Listening on Unix domain socket");
        tokio::pin!(shutdown);

        let result = loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let handler = self.command_handler.clone();
                        let stats = Arc::clone(&self.stats);
                        tokio::spawn(handle_connection(stream, handler, stats));
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                        break Err(ServerError::Accept(e));
                    }
                },
                _ = &mut shutdown => {
                    debug!("Shutdown requested, closing listener");
                    break Ok(());
                }
            }
        };

        drop(self.listener);
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.socket_path.display(), error = %e, "Failed to remove socket file");
            }
        }

        result
    }
}

/// Removes whatever exists at `path`, if anything.
fn remove_stale(path: &Path) -> io::Result<()> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    debug!(path = %path.display(), "Removing stale socket");
    if metadata.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    }
}
