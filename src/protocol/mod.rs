//! Wire Protocol Implementation
//!
//! This module covers everything that crosses the socket: the
//! length-prefixed framing and the JSON envelopes carried inside frames.
//!
//! ## Modules
//!
//! - `frame`: 2-byte big-endian length prefix codec
//! - `envelope`: request envelope parsing and the response envelope
//!
//! ## Example
//!
//! ```
//! use windproxy::protocol::{frame, Envelope};
//!
//! let bytes = frame::encode(br#"["s1","http_request",{"url":"http://localhost/"}]"#).unwrap();
//! let (payload, consumed) = frame::decode(&bytes).unwrap();
//! assert_eq!(consumed, bytes.len());
//!
//! let envelope = Envelope::parse(&payload).unwrap();
//! assert_eq!(envelope.session, "s1");
//! ```

pub mod envelope;
pub mod frame;

// Re-export commonly used types for convenience
pub use envelope::{Envelope, HeaderMap, ProtocolError, ResponseEnvelope};
pub use frame::{FrameError, MAX_PAYLOAD};
