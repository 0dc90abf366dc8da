//! Command Dispatcher
//!
//! Routes a decoded [`Envelope`] to the matching command and turns the
//! outcome into a [`ResponseEnvelope`] carrying the same session.
//!
//! ## Supported Commands
//!
//! - `http_request {method, url, body, header}` - performs an HTTP request
//!   and returns the response body and headers
//!
//! Every failure at this level, including an unknown command name, becomes
//! an error response. Nothing here closes the connection.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │  execute()  │───>│  dispatch() │───>│ HttpClient  │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │         ▲                                     │             │
//! │         └──────────── ResponseEnvelope ◄──────┘             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use super::http::{HttpClient, HttpError, HttpRequest, HttpResponse};
use crate::protocol::{Envelope, ResponseEnvelope};
use serde_json::{Map, Value};
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Name of the HTTP request command
pub const HTTP_REQUEST: &str = "http_request";

/// Errors reported back to the caller in the response's `error` field.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("invalid params for '{command}'")]
    InvalidParams {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// Executes commands on behalf of connections.
///
/// Cheap to clone; every connection shares the same collaborator.
#[derive(Clone)]
pub struct CommandHandler {
    /// Performs `http_request`
    client: Arc<dyn HttpClient>,
    /// Deadline for one outbound request, `None` for no limit
    timeout: Option<Duration>,
}

impl CommandHandler {
    /// Creates a handler using the default request timeout.
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self {
            client,
            timeout: Some(crate::DEFAULT_REQUEST_TIMEOUT),
        }
    }

    /// Replaces the outbound request deadline.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Executes a command and returns the response to send back.
    pub async fn execute(&self, envelope: Envelope) -> ResponseEnvelope {
        let Envelope {
            session,
            command,
            params,
        } = envelope;

        match self.dispatch(&command, params).await {
            Ok(HttpResponse { body, header }) => {
                debug!(session = %session, command = %command, "Command succeeded");
                ResponseEnvelope::success(session, body, header)
            }
            Err(e) => {
                let message = error_chain(&e);
                debug!(session = %session, command = %command, error = %message, "Command failed");
                ResponseEnvelope::failure(session, message)
            }
        }
    }

    /// Dispatches a command to its implementation.
    async fn dispatch(
        &self,
        command: &str,
        params: Map<String, Value>,
    ) -> Result<HttpResponse, CommandError> {
        match command {
            HTTP_REQUEST => self.cmd_http_request(params).await,
            _ => Err(CommandError::UnknownCommand(command.to_string())),
        }
    }

    async fn cmd_http_request(&self, params: Map<String, Value>) -> Result<HttpResponse, CommandError> {
        let request: HttpRequest = serde_json::from_value(Value::Object(params)).map_err(|source| {
            CommandError::InvalidParams {
                command: HTTP_REQUEST.to_string(),
                source,
            }
        })?;

        let call = self.client.send(request);
        let response = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| CommandError::Timeout(limit))??,
            None => call.await?,
        };

        Ok(response)
    }
}

/// Formats an error followed by each of its sources, separated by `: `.
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.ends_with(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
