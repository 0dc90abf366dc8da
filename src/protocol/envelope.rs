//! Request and Response Envelopes
//!
//! A request payload is a JSON array of exactly three elements:
//!
//! ```text
//! ["<session>", "<command>", { ...params... }]
//! ```
//!
//! A response payload is a JSON object:
//!
//! ```text
//! {"session": "<session>", "error": "", "header": {"Name": ["v1"]}, "body": "..."}
//! ```
//!
//! The session is chosen by the caller and echoed verbatim. It is the only
//! way a caller can match a response to its request, because responses on
//! one connection may arrive in any order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Response headers: canonical name to every value received for it.
pub type HeaderMap = BTreeMap<String, Vec<String>>;

/// A decoded command request.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Caller-chosen correlation token
    pub session: String,
    /// Command name, e.g. `http_request`
    pub command: String,
    /// Command parameters, validated by the command itself
    pub params: Map<String, Value>,
}

/// Errors raised while decoding a request payload.
///
/// Each variant remembers the session when it could still be read out of
/// the payload, so the connection can answer instead of hanging up.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Payload is not UTF-8 JSON at all
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Top-level value is not an array
    #[error("envelope must be an array, got {0}")]
    NotAnArray(&'static str),

    /// First element is missing or is not a string
    #[error("envelope session must be a string")]
    InvalidSession,

    /// Array does not have exactly three elements
    #[error("envelope must have 3 elements, got {len}")]
    WrongLength { len: usize, session: String },

    /// Second element is not a string
    #[error("envelope command must be a string")]
    InvalidCommand { session: String },

    /// Third element is not an object
    #[error("envelope params must be an object")]
    InvalidParams { session: String },
}

impl ProtocolError {
    /// Returns the session recovered from the malformed payload, if any.
    pub fn session(&self) -> Option<&str> {
        match self {
            ProtocolError::WrongLength { session, .. }
            | ProtocolError::InvalidCommand { session }
            | ProtocolError::InvalidParams { session } => Some(session),
            ProtocolError::InvalidJson(_)
            | ProtocolError::NotAnArray(_)
            | ProtocolError::InvalidSession => None,
        }
    }
}

impl Envelope {
    /// Creates an envelope.
    pub fn new(
        session: impl Into<String>,
        command: impl Into<String>,
        params: Map<String, Value>,
    ) -> Self {
        Self {
            session: session.into(),
            command: command.into(),
            params,
        }
    }

    /// Decodes a frame payload into an envelope.
    ///
    /// # Example
    ///
    /// ```
    /// use windproxy::protocol::Envelope;
    ///
    /// let envelope = Envelope::parse(br#"["s1", "http_request", {"url": "http://localhost"}]"#).unwrap();
    /// assert_eq!(envelope.session, "s1");
    /// assert_eq!(envelope.command, "http_request");
    /// ```
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_slice(payload)?;

        let mut items = match value {
            Value::Array(items) => items,
            other => return Err(ProtocolError::NotAnArray(json_type_name(&other))),
        };

        // The session is recovered first so every later error can carry it.
        let session = match items.first() {
            Some(Value::String(s)) => s.clone(),
            _ => return Err(ProtocolError::InvalidSession),
        };

        if items.len() != 3 {
            return Err(ProtocolError::WrongLength {
                len: items.len(),
                session,
            });
        }

        let params = match items.pop() {
            Some(Value::Object(map)) => map,
            _ => return Err(ProtocolError::InvalidParams { session }),
        };

        let command = match items.pop() {
            Some(Value::String(s)) => s,
            _ => return Err(ProtocolError::InvalidCommand { session }),
        };

        Ok(Self {
            session,
            command,
            params,
        })
    }

    /// Serializes the envelope into its wire JSON form.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&(&self.session, &self.command, &self.params))
    }
}

/// A response correlated to a request by its session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub session: String,
    /// Empty on success
    pub error: String,
    pub header: HeaderMap,
    pub body: String,
}

impl ResponseEnvelope {
    /// Creates a successful response.
    pub fn success(session: impl Into<String>, body: impl Into<String>, header: HeaderMap) -> Self {
        Self {
            session: session.into(),
            error: String::new(),
            header,
            body: body.into(),
        }
    }

    /// Creates an error response with empty header and body.
    pub fn failure(session: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            error: error.into(),
            header: HeaderMap::new(),
            body: String::new(),
        }
    }

    /// Returns true if this response reports a failure.
    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }

    /// Serializes the response into its wire JSON form.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decodes a response payload.
    pub fn parse(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
