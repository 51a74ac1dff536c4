//! Runs the built `http-get` binary against loopback responders and checks
//! what it prints and how it exits.

use std::process::{Command, Output};

use tokio::net::TcpListener;

const REPLY: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nOK";

async fn run(args: Vec<String>) -> Output {
    tokio::task::spawn_blocking(move || {
        Command::new(env!("CARGO_BIN_EXE_http-get"))
            .args(&args)
            .env_remove("RUST_LOG")
            .output()
            .unwrap()
    })
    .await
    .unwrap()
}

fn plain_args(port: u16) -> Vec<String> {
    vec!["127.0.0.1".to_string(), port.to_string(), "/".to_string()]
}

#[tokio::test(flavor = "multi_thread")]
async fn prints_response_and_exits_successfully() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(mock_server::respond_once(listener, REPLY));

    let output = run(plain_args(port)).await;

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let mut expected = REPLY.to_vec();
    expected.push(b'\n');
    assert_eq!(output.stdout, expected);
    let request = server.await.unwrap().unwrap();
    assert!(request.starts_with(b"GET / HTTP/1.1\r\nHost: 127.0.0.1\r\n"));
}

#[tokio::test(flavor = "multi_thread")]
async fn refused_connection_exits_with_failure() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let output = run(plain_args(port)).await;

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("connect: "));
}

#[tokio::test(flavor = "multi_thread")]
async fn truncated_response_exits_with_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(mock_server::respond_once(
        listener,
        b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nshort",
    ));

    let output = run(plain_args(port)).await;

    server.await.unwrap().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("read: "));
}

#[tokio::test]
async fn missing_positionals_exit_with_usage_error() {
    let output = run(vec!["127.0.0.1".to_string()]).await;

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage"));
}
