//! windproxy - Local Command Bridge
//!
//! This is the main entry point for the windproxy server.
//! It parses arguments, sets up logging, binds the Unix socket, and runs
//! the accept loop until Ctrl+C.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use windproxy::commands::ReqwestClient;
use windproxy::server::{Server, ServerConfig};

/// Parse configuration from command-line arguments
fn config_from_args() -> ServerConfig {
    let mut config = ServerConfig::default();
    let args: Vec<String> = std::env::args().collect();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--socket" | "-s" => {
                if i + 1 < args.len() {
                    config.socket_path = PathBuf::from(&args[i + 1]);
                    i += 2;
                } else {
                    eprintln!("Error: --socket requires a value");
                    std::process::exit(1);
                }
            }
            "--timeout" | "-t" => {
                if i + 1 < args.len() {
                    let secs: u64 = args[i + 1].parse().unwrap_or_else(|_| {
                        eprintln!("Error: invalid timeout");
                        std::process::exit(1);
                    });
                    config.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
                    i += 2;
                } else {
                    eprintln!("Error: --timeout requires a value");
                    std::process::exit(1);
                }
            }
            "--help" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-v" => {
                println!("windproxy version {}", windproxy::VERSION);
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    config
}

fn print_help() {
    println!(
        r#"
windproxy - Local Command Bridge

USAGE:
    windproxy [OPTIONS]

OPTIONS:
    -s, --socket <PATH>    Unix socket path (default: {})
    -t, --timeout <SECS>   Outbound request timeout, 0 for none (default: {})
    -v, --version          Print version information
        --help             Print this help message

PROTOCOL:
    Each frame is a 2-byte big-endian length followed by UTF-8 JSON.
    Request:  ["<session>", "http_request", {{"method": "GET", "url": "...", "body": "", "header": {{}}}}]
    Response: {{"session": "<session>", "error": "", "header": {{...}}, "body": "..."}}

LOGGING:
    Set RUST_LOG to adjust verbosity, e.g. RUST_LOG=windproxy=debug
"#,
        windproxy::DEFAULT_SOCKET_PATH,
        windproxy::DEFAULT_REQUEST_TIMEOUT.as_secs()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = config_from_args();

    // Set up logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    info!(version = windproxy::VERSION, "Starting windproxy");
    match config.request_timeout {
        Some(timeout) => info!(timeout_secs = timeout.as_secs(), "Outbound request timeout set"),
        None => warn!("Outbound requests have no timeout"),
    }

    let server = Server::bind(&config, Arc::new(ReqwestClient::new()))?;
    let stats = server.stats();

    // Set up graceful shutdown
    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received, stopping server...");
    };

    server.run(shutdown).await?;

    info!(
        connections = stats.connections_accepted.load(Ordering::Relaxed),
        requests = stats.requests_processed.load(Ordering::Relaxed),
        bytes_read = stats.bytes_read.load(Ordering::Relaxed),
        bytes_written = stats.bytes_written.load(Ordering::Relaxed),
        "Server shutdown complete"
    );
    Ok(())
}
