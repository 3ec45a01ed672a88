//! Minimal HTTP/1.1 gateway for provider tests.
//!
//! `GET /users?phone=<p>`: 200 with an identity for known phones, 429 for
//! phones listed as throttled, 404 otherwise. `POST /messages`: 200 with a
//! message id; the request bodies are kept for inspection.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Debug, Default)]
pub struct GatewayState {
    /// phone -> identity JSON
    pub users: HashMap<String, String>,
    pub throttled: Vec<String>,
    pub messages: Mutex<Vec<String>>,
}

/// Starts a server in a background thread. Returns the base URL
/// (e.g. "http://127.0.0.1:12345"). The server runs until the process exits.
pub fn start(state: Arc<GatewayState>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let state = Arc::clone(&state);
            thread::spawn(move || handle(stream, &state));
        }
    });
    format!("http://127.0.0.1:{}", port)
}

fn handle(mut stream: std::net::TcpStream, state: &GatewayState) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let Some((head, body)) = read_request(&mut stream) else {
        return;
    };
    let request_line = head.lines().next().unwrap_or("");
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let target = parts.next().unwrap_or("");

    let (status, payload) = if method == "GET" && target.starts_with("/users?phone=") {
        let phone = &target["/users?phone=".len()..];
        if state.throttled.iter().any(|p| p == phone) {
            ("429 Too Many Requests", "Too Many Requests".to_string())
        } else if let Some(user) = state.users.get(phone) {
            ("200 OK", user.clone())
        } else {
            ("404 Not Found", String::new())
        }
    } else if method == "POST" && target == "/messages" {
        state.messages.lock().unwrap().push(body);
        ("200 OK", r#"{"messageId":"m-1"}"#.to_string())
    } else {
        ("405 Method Not Allowed", String::new())
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n{}",
        status,
        payload.len(),
        payload
    );
    let _ = stream.write_all(response.as_bytes());
}

/// Read headers and a Content-Length body.
fn read_request(stream: &mut std::net::TcpStream) -> Option<(String, String)> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
        let text = String::from_utf8_lossy(&data).into_owned();
        let Some(split) = text.find("\r\n\r\n") else {
            continue;
        };
        let head = text[..split].to_string();
        let length = head
            .lines()
            .filter_map(|l| l.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        let body_start = split + 4;
        if data.len() >= body_start + length {
            let body = String::from_utf8_lossy(&data[body_start..body_start + length]).into_owned();
            return Some((head, body));
        }
    }
}
