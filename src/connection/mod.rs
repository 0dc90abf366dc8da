//! Connection Handler Module
//!
//! This module manages individual client connections.
//! Each connection is handled by its own async task, and every request on
//! it by another, so one connection can have many requests in flight.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Unix Listener                           │
//! │                     (server.rs)                             │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ accept()
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ Read bytes  │───>│ Decode frame│───>│ Spawn task  │     │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘     │
//! │                                               │             │
//! │                                               ▼             │
//! │                     ┌──────────────────────────────────┐    │
//! │                     │ Responder (write lock per conn)  │    │
//! │                     └──────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use windproxy::connection::{handle_connection, ConnectionStats};
//! use windproxy::commands::{CommandHandler, ReqwestClient};
//! use std::sync::Arc;
//!
//! let stats = Arc::new(ConnectionStats::new());
//! let handler = CommandHandler::new(Arc::new(ReqwestClient::new()));
//!
//! // For each accepted connection...
//! let (stream, _) = listener.accept().await?;
//! tokio::spawn(handle_connection(stream, handler, stats));
//! ```

pub mod handler;
pub mod responder;

// Re-export commonly used types
pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
pub use responder::Responder;
