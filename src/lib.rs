//! # windproxy - A Local Command Bridge over a Unix Socket
//!
//! windproxy listens on a Unix domain socket, reads length-prefixed frames
//! carrying JSON command envelopes, executes each command, and writes back
//! a framed JSON response tagged with the caller's session.
//!
//! ## Features
//!
//! - **Simple framing**: 2-byte big-endian length followed by the payload
//! - **Concurrent requests**: every frame runs in its own task, so a slow
//!   command never holds up the ones behind it on the same connection
//! - **Session correlation**: responses may arrive out of order and are
//!   matched by the session the caller chose
//! - **Safe writes**: a per-connection write lock keeps frames whole
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              windproxy                                  │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ Unix Server │───>│ Connection  │───>│  Command    │                  │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │                  │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘                  │
//! │                            │                  │                         │
//! │                            ▼                  ▼                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │   Frame     │    │  Responder  │    │ HttpClient  │                  │
//! │  │   Codec     │    │ (write lock)│    │  (reqwest)  │                  │
//! │  └─────────────┘    └─────────────┘    └─────────────┘                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//!
//! Request payload: `["<session>", "<command>", {params}]`
//!
//! Response payload: `{"session": "...", "error": "", "header": {...}, "body": "..."}`
//!
//! ## Quick Start
//!
//! ```ignore
//! use windproxy::commands::ReqwestClient;
//! use windproxy::server::{Server, ServerConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::new("/tmp/windproxy.sock");
//!     let server = Server::bind(&config, Arc::new(ReqwestClient::new()))?;
//!     server.run(async { tokio::signal::ctrl_c().await.ok(); }).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `http_request {method, url, body, header}`
//!
//! ## Module Overview
//!
//! - [`protocol`]: frame codec and envelopes
//! - [`commands`]: command dispatch and the HTTP collaborator
//! - [`connection`]: per-connection reader loop and responder
//! - [`server`]: Unix socket listener
//! - [`client`]: client for the bridge socket

use std::time::Duration;

pub mod client;
pub mod commands;
pub mod connection;
pub mod protocol;
pub mod server;

// Re-export commonly used types for convenience
pub use client::{Client, ClientError};
pub use commands::{CommandHandler, HttpClient, ReqwestClient};
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{Envelope, ProtocolError, ResponseEnvelope};
pub use server::{Server, ServerConfig, ServerError};

/// The default socket path
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/windproxy.sock";

/// The default deadline for one outbound request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Version of windproxy
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
