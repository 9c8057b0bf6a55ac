//! Integration tests for the `convenios serve` HTTP API.
//!
//! Each test starts the server as a child process on a unique port,
//! makes HTTP requests, and verifies the responses.

use std::io::Read;
use std::net::TcpStream;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use tempfile::TempDir;

/// Atomic port counter to avoid port conflicts between parallel tests.
/// Base port is derived from process ID so separate test binaries don't
/// collide on the same port range.
static NEXT_PORT: AtomicU16 = AtomicU16::new(0);
static PORT_INIT: std::sync::Once = std::sync::Once::new();

fn next_port() -> u16 {
    PORT_INIT.call_once(|| {
        let base = 20000 + (std::process::id() as u16 % 20000);
        NEXT_PORT.store(base, Ordering::SeqCst);
    });
    NEXT_PORT.fetch_add(1, Ordering::SeqCst)
}

/// Kills the server when the test ends, pass or fail.
struct Server {
    child: Child,
    port: u16,
    _dir: TempDir,
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Helper: start `convenios serve` with a config rooted in a temp dir.
fn start_server() -> Server {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("convenios.toml");
    std::fs::write(
        &config,
        format!(
            "[documents]\nroot = \"{}\"\n",
            dir.path().join("docs").display()
        ),
    )
    .unwrap();

    let port = next_port();
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_convenios"));
    cmd.arg("--config")
        .arg(&config)
        .arg("serve")
        .arg("--port")
        .arg(port.to_string());
    // Redirect stdout/stderr to avoid blocking
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());

    let child = cmd.spawn().expect("failed to start convenios serve");
    // Wait for server to be ready by polling the port
    for _ in 0..50 {
        if TcpStream::connect(format!("127.0.0.1:{}", port)).is_ok() {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    Server {
        child,
        port,
        _dir: dir,
    }
}

/// Helper: make a simple HTTP GET request and return (status, body).
fn http_get(port: u16, path: &str) -> (u16, String) {
    let mut stream = TcpStream::connect(format!("127.0.0.1:{}", port)).expect("failed to connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();

    let request = format!(
        "GET {} HTTP/1.1\r\nHost: localhost:{}\r\nConnection: close\r\n\r\n",
        path, port
    );
    std::io::Write::write_all(&mut stream, request.as_bytes()).expect("failed to write");

    let mut response = String::new();
    let _ = stream.read_to_string(&mut response);

    parse_http_response(&response)
}

fn parse_http_response(response: &str) -> (u16, String) {
    let status = response
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    let body = response
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_default();
    (status, body)
}

#[test]
fn health_endpoint_over_tcp() {
    let server = start_server();
    let (status, body) = http_get(server.port, "/health");
    assert_eq!(status, 200);
    assert!(body.contains("\"status\":\"ok\""), "body: {}", body);
}

#[test]
fn protected_endpoint_rejects_missing_session() {
    let server = start_server();
    let (status, body) = http_get(server.port, "/convenios");
    assert_eq!(status, 401);
    assert!(body.contains("unauthenticated"), "body: {}", body);
}
