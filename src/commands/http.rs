//! HTTP Request Collaborator
//!
//! The `http_request` command hands its parameters to an [`HttpClient`].
//! The dispatcher only depends on the trait; [`ReqwestClient`] is the
//! implementation the server runs with.
//!
//! Any response the remote end sends back is a success, whatever its
//! status code. Only failures to build or deliver the request are errors.

use crate::protocol::HeaderMap;
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Client, Method, Url};
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::trace;

/// Parameters of the `http_request` command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HttpRequest {
    /// HTTP method; empty means `GET`
    #[serde(default)]
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub body: String,
    /// Request headers, each set with replace semantics
    #[serde(default)]
    pub header: HashMap<String, String>,
}

/// What the remote end sent back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub body: String,
    pub header: HeaderMap,
}

/// Errors from building or sending an outbound request.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid method {0:?}")]
    InvalidMethod(String),

    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid header {0:?}")]
    InvalidHeader(String),

    /// Connection, DNS, TLS, or body read failure
    #[error("request failed")]
    Request(#[from] reqwest::Error),
}

/// Capability that performs one outbound HTTP request.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// [`HttpClient`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    /// Creates a client with reqwest's default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an already configured `reqwest::Client`.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let method = parse_method(&request.method)?;
        let url = Url::parse(&request.url).map_err(|e| HttpError::InvalidUrl {
            url: request.url.clone(),
            reason: e.to_string(),
        })?;

        let mut headers = reqwest::header::HeaderMap::with_capacity(request.header.len());
        for (name, value) in &request.header {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| HttpError::InvalidHeader(name.clone()))?;
            let header_value =
                HeaderValue::from_str(value).map_err(|_| HttpError::InvalidHeader(name.clone()))?;
            headers.insert(header_name, header_value);
        }

        trace!(method = %method, url = %url, "Sending outbound request");

        let mut builder = self.client.request(method, url).headers(headers);
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let response = builder.send().await?;
        trace!(status = %response.status(), "Received outbound response");

        let header = collect_headers(response.headers());
        let bytes = response.bytes().await?;

        Ok(HttpResponse {
            body: String::from_utf8_lossy(&bytes).into_owned(),
            header,
        })
    }
}

fn parse_method(method: &str) -> Result<Method, HttpError> {
    if method.is_empty() {
        return Ok(Method::GET);
    }
    Method::from_bytes(method.as_bytes()).map_err(|_| HttpError::InvalidMethod(method.to_string()))
}

/// Groups response headers by canonical name, keeping every value in order.
pub fn collect_headers(headers: &reqwest::header::HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::new();
    for (name, value) in headers {
        out.entry(canonical_header_key(name.as_str()))
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    out
}

/// Converts a header name to canonical MIME form, e.g. `content-type` to
/// `Content-Type`.
///
/// Names containing a space or a non-token byte are returned unchanged.
pub fn canonical_header_key(name: &str) -> String {
    if !name.bytes().all(is_token_byte) {
        return name.to_string();
    }

    let mut upper = true;
    name.chars()
        .map(|c| {
            let out = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            out
        })
        .collect()
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}
