//! Minimal blocking HTTP server for opener tests: serves one byte body,
//! optionally gated on a query-string token, and counts transport hits.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

pub struct TestServer {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Number of connections the transport has received.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Spawn a server that answers every GET with `body`. When
/// `required_token` is `(name, value)`, requests whose query string lacks
/// that exact pair get 401 instead.
pub fn serve_bytes(body: Vec<u8>, required_token: Option<(String, String)>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server");
    let addr = listener.local_addr().expect("server addr");
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_in_thread = Arc::clone(&hits);

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            hits_in_thread.fetch_add(1, Ordering::SeqCst);
            handle_request(stream, &body, required_token.as_ref());
        }
    });

    TestServer { addr, hits }
}

fn handle_request(mut stream: TcpStream, body: &[u8], required_token: Option<&(String, String)>) {
    let mut chunk = [0u8; 4096];
    let mut request = Vec::new();
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                request.extend_from_slice(&chunk[..n]);
                if request.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            Err(_) => return,
        }
    }

    let head = String::from_utf8_lossy(&request);
    let target = head.split_whitespace().nth(1).unwrap_or("/");
    let query = target.splitn(2, '?').nth(1).unwrap_or("");

    let authorized = match required_token {
        None => true,
        Some((name, value)) => {
            let expected = format!("{name}={value}");
            query.split('&').any(|pair| pair == expected)
        }
    };

    let response = if authorized {
        let mut bytes = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        )
        .into_bytes();
        bytes.extend_from_slice(body);
        bytes
    } else {
        b"HTTP/1.1 401 Unauthorized\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec()
    };
    let _ = stream.write_all(&response);
}
