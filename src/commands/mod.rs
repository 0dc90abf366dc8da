//! Command Handler Module
//!
//! This module implements the command processing layer. It receives parsed
//! envelopes, runs the named command, and returns the response envelope.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │ Envelope Parser │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Dispatch     │
//! │  - Validate     │
//! │  - Execute      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   HttpClient    │  (collaborator)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - `http_request`

pub mod handler;
pub mod http;

#[cfg(test)]
pub(crate) mod stub;

// Re-export the main command handler
pub use handler::{error_chain, CommandError, CommandHandler, HTTP_REQUEST};
pub use http::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestClient};
