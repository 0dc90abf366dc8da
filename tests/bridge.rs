//! End-to-end tests: a bound server, the reqwest collaborator, and a small
//! HTTP server running inside the test.

use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UnixStream};
use tokio::sync::oneshot;
use windproxy::protocol::frame;
use windproxy::{Client, ClientError, Envelope, ReqwestClient, Server, ServerConfig};

/// Serves `GET /ok` with body `ok`, `/slow` after 300ms with body `slow`,
/// anything else with a 404.
async fn start_http_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let mut total = 0;
                loop {
                    let n = match stream.read(&mut buf[total..]).await {
                        Ok(n) => n,
                        Err(_) => return,
                    };
                    total += n;
                    if n == 0 || buf[..total].windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }

                let head = String::from_utf8_lossy(&buf[..total]).into_owned();
                let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();

                let (status, body) = match path.as_str() {
                    "/ok" => ("200 OK", "ok"),
                    "/slow" => {
                        tokio::time::sleep(Duration::from_millis(300)).await;
                        ("200 OK", "slow")
                    }
                    _ => ("404 Not Found", "missing"),
                };

                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nX-Served-By: test\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    format!("http://{}", addr)
}

struct Harness {
    _dir: tempfile::TempDir,
    path: PathBuf,
    stop: Option<oneshot::Sender<()>>,
    server: tokio::task::JoinHandle<Result<(), windproxy::ServerError>>,
}

impl Harness {
    async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("windproxy.sock");

        let mut config = ServerConfig::new(&path);
        config.request_timeout = Some(Duration::from_secs(5));
        let server = Server::bind(&config, Arc::new(ReqwestClient::new())).unwrap();

        let (stop, stopped) = oneshot::channel::<()>();
        let server = tokio::spawn(server.run(async {
            let _ = stopped.await;
        }));

        Self {
            _dir: dir,
            path,
            stop: Some(stop),
            server,
        }
    }

    async fn client(&self) -> Client {
        Client::connect(&self.path).await.unwrap()
    }

    async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        (&mut self.server).await.unwrap().unwrap();
        assert!(!self.path.exists());
    }
}

fn http_params(method: &str, url: &str) -> Map<String, Value> {
    match json!({"method": method, "url": url, "body": "", "header": {}}) {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn test_http_request_correlates_session() {
    let base = start_http_server().await;
    let harness = Harness::start().await;
    let mut client = harness.client().await;

    let response = client
        .call("s1", "http_request", http_params("GET", &format!("{}/ok", base)))
        .await
        .unwrap();

    assert_eq!(response.session, "s1");
    assert_eq!(response.error, "");
    assert_eq!(response.body, "ok");
    assert_eq!(response.header["Content-Type"], vec!["text/plain"]);
    assert_eq!(response.header["X-Served-By"], vec!["test"]);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_non_2xx_is_success() {
    let base = start_http_server().await;
    let harness = Harness::start().await;
    let mut client = harness.client().await;

    let response = client
        .call("nf", "http_request", http_params("GET", &format!("{}/nope", base)))
        .await
        .unwrap();

    assert_eq!(response.error, "");
    assert_eq!(response.body, "missing");

    harness.shutdown().await;
}

#[tokio::test]
async fn test_unreachable_url_reports_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let harness = Harness::start().await;
    let mut client = harness.client().await;

    let response = client
        .call("down", "http_request", http_params("GET", &format!("http://{}/", addr)))
        .await
        .unwrap();

    assert_eq!(response.session, "down");
    assert!(!response.error.is_empty());
    assert_eq!(response.body, "");
    assert!(response.header.is_empty());

    // The connection survives a failed command.
    let response = client.call("after", "frobnicate", Map::new()).await.unwrap();
    assert_eq!(response.session, "after");

    harness.shutdown().await;
}

#[tokio::test]
async fn test_unknown_command_reports_error() {
    let harness = Harness::start().await;
    let mut client = harness.client().await;

    let response = client.call("s2", "frobnicate", Map::new()).await.unwrap();
    assert_eq!(response.session, "s2");
    assert!(!response.error.is_empty());

    harness.shutdown().await;
}

#[tokio::test]
async fn test_overlapping_requests_keep_their_sessions() {
    let base = start_http_server().await;
    let harness = Harness::start().await;
    let mut client = harness.client().await;

    client
        .send(&Envelope::new("a", "http_request", http_params("GET", &format!("{}/slow", base))))
        .await
        .unwrap();
    client
        .send(&Envelope::new("b", "http_request", http_params("GET", &format!("{}/ok", base))))
        .await
        .unwrap();

    let first = client.recv().await.unwrap();
    let second = client.recv().await.unwrap();

    assert_eq!((first.session.as_str(), first.body.as_str()), ("b", "ok"));
    assert_eq!((second.session.as_str(), second.body.as_str()), ("a", "slow"));

    harness.shutdown().await;
}

#[tokio::test]
async fn test_malformed_payloads() {
    let harness = Harness::start().await;
    let mut client = harness.client().await;

    // Session recoverable: answered with an error.
    client.send_raw(br#"["m1", 5, {}]"#).await.unwrap();
    let response = client.recv().await.unwrap();
    assert_eq!(response.session, "m1");
    assert!(response.error.starts_with("protocol error"));

    // Session unrecoverable: the connection is closed.
    client.send_raw(br#"{"not": "an array"}"#).await.unwrap();
    assert!(matches!(client.recv().await, Err(ClientError::Closed)));

    // The server keeps accepting.
    let mut other = harness.client().await;
    let response = other.call("s9", "frobnicate", Map::new()).await.unwrap();
    assert_eq!(response.session, "s9");

    harness.shutdown().await;
}

#[tokio::test]
async fn test_raw_wire_format() {
    let harness = Harness::start().await;
    let mut stream = UnixStream::connect(&harness.path).await.unwrap();

    let payload = br#"["raw","frobnicate",{}]"#;
    let mut request = vec![0u8, payload.len() as u8];
    request.extend_from_slice(payload);
    stream.write_all(&request).await.unwrap();

    let mut header = [0u8; 2];
    stream.read_exact(&mut header).await.unwrap();
    let len = u16::from_be_bytes(header) as usize;
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await.unwrap();

    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["session"], json!("raw"));
    assert_eq!(value["header"], json!({}));
    assert_eq!(value["body"], json!(""));
    assert!(value["error"].as_str().unwrap().contains("frobnicate"));

    // Clean close from the client ends the connection without fuss.
    drop(stream);
    let mut stream = UnixStream::connect(&harness.path).await.unwrap();
    frame::write_frame(&mut stream, payload).await.unwrap();
    assert!(frame::read_frame(&mut stream).await.unwrap().is_some());

    harness.shutdown().await;
}

#[tokio::test]
async fn test_stale_socket_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("windproxy.sock");

    // A socket left behind by a previous process.
    let first = Server::bind(&ServerConfig::new(&path), Arc::new(ReqwestClient::new())).unwrap();
    drop(first);
    assert!(path.exists());

    let server = Server::bind(&ServerConfig::new(&path), Arc::new(ReqwestClient::new())).unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.run(async {
        let _ = stopped.await;
    }));

    let mut client = Client::connect(&path).await.unwrap();
    let response = client.call("s1", "frobnicate", Map::new()).await.unwrap();
    assert_eq!(response.session, "s1");

    let _ = stop.send(());
    handle.await.unwrap().unwrap();
}
