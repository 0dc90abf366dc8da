//! Deterministic [`HttpClient`] for unit tests.
//!
//! - URLs starting with `unreachable` are rejected as invalid URLs
//! - an `x-delay-ms` request header delays the reply
//! - the reply body echoes the request body, headers echo method and URL

use super::http::{HttpClient, HttpError, HttpRequest, HttpResponse};
use crate::protocol::HeaderMap;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub(crate) struct StubClient {
    pub calls: AtomicUsize,
}

#[async_trait]
impl HttpClient for StubClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(ms) = request.header.get("x-delay-ms") {
            let ms: u64 = ms.parse().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }

        if request.url.starts_with("unreachable") {
            return Err(HttpError::InvalidUrl {
                url: request.url,
                reason: "unsupported scheme".to_string(),
            });
        }

        let mut header = HeaderMap::new();
        header.insert("X-Method".to_string(), vec![request.method]);
        header.insert("X-Url".to_string(), vec![request.url]);

        Ok(HttpResponse {
            body: request.body,
            header,
        })
    }
}
