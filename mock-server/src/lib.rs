//! Test responders for the GET client.
//!
//! - `app` is a small axum application: `/` answers `OK`, `/echo` reports
//!   what the server saw of the request as JSON.
//! - `respond_once` and `respond_then_drain` work on raw bytes over a single
//!   accepted connection, for exchanges that must be byte-exact or are not
//!   HTTP at all.

use axum::{
    http::{header, HeaderMap, Method, Version},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};

/// What `/echo` observed about the request.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Echo {
    pub method: String,
    pub version: String,
    pub host: Option<String>,
    pub user_agent: Option<String>,
}

pub fn app() -> Router {
    Router::new()
        .route("/", get(root))
        .route("/echo", get(echo))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn root() -> &'static str {
    "OK"
}

async fn echo(method: Method, version: Version, headers: HeaderMap) -> Json<Echo> {
    let text = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Json(Echo {
        method: method.to_string(),
        version: format!("{version:?}"),
        host: text(header::HOST),
        user_agent: text(header::USER_AGENT),
    })
}

/// Accepts one connection, reads the request head, writes `reply` verbatim
/// and closes. Returns the bytes received.
pub async fn respond_once(listener: TcpListener, reply: &[u8]) -> std::io::Result<Vec<u8>> {
    let (mut stream, _) = listener.accept().await?;
    let mut request: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        request.extend_from_slice(&chunk[..n]);
    }
    stream.write_all(reply).await?;
    stream.flush().await?;
    Ok(request)
}

/// Accepts one connection, writes `reply` straight away, then collects
/// everything the client sends until it disconnects.
pub async fn respond_then_drain(listener: TcpListener, reply: &[u8]) -> std::io::Result<Vec<u8>> {
    let (mut stream, _) = listener.accept().await?;
    stream.write_all(reply).await?;
    let mut received = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => return Ok(received),
            Ok(n) => received.extend_from_slice(&chunk[..n]),
            // a client abandoning a failed handshake may reset the connection
            Err(err) if err.kind() == std::io::ErrorKind::ConnectionReset => return Ok(received),
            Err(err) => return Err(err),
        }
    }
}
