#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use reqwest::StatusCode;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

#[derive(Debug, Clone)]
pub struct Hit {
    pub method: String,
    /// Path plus query string.
    pub target: String,
    pub body: String,
}

/// Minimal HTTP/1.1 server answering canned responses keyed by path.
/// Unknown paths get a 404 with an empty body.
pub struct StubServer {
    pub base_url: String,
    hits: Arc<Mutex<Vec<Hit>>>,
}

impl StubServer {
    pub async fn start(routes: Vec<(&str, u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let routes: Arc<HashMap<String, (u16, String)>> = Arc::new(
            routes
                .into_iter()
                .map(|(path, status, body)| (path.to_string(), (status, body)))
                .collect(),
        );
        let hits = Arc::new(Mutex::new(Vec::new()));

        let server_hits = hits.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let routes = routes.clone();
                let hits = server_hits.clone();
                tokio::spawn(async move { serve(socket, &routes, &hits).await });
            }
        });

        Self { base_url, hits }
    }

    pub fn hits(&self) -> Vec<Hit> {
        self.hits.lock().unwrap().clone()
    }

    /// Requested paths, query strings stripped, in arrival order.
    pub fn paths(&self) -> Vec<String> {
        self.hits()
            .into_iter()
            .map(|hit| hit.target.split('?').next().unwrap_or_default().to_string())
            .collect()
    }
}

async fn serve(
    mut socket: TcpStream,
    routes: &HashMap<String, (u16, String)>,
    hits: &Mutex<Vec<Hit>>,
) {
    let (head, body) = read_request(&mut socket).await;
    let mut request_line = head.lines().next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let target = request_line.next().unwrap_or_default().to_string();
    let path = target.split('?').next().unwrap_or_default();

    let (status, response_body) = routes.get(path).cloned().unwrap_or((404, String::new()));
    hits.lock().unwrap().push(Hit {
        method,
        target: target.clone(),
        body,
    });

    let reason = StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown");
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{response_body}",
        response_body.len()
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

async fn read_request(socket: &mut TcpStream) -> (String, String) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_string();
            if buf.len() >= end + 4 + content_length(&head) {
                let body = String::from_utf8_lossy(&buf[end + 4..]).to_string();
                return (head, body);
            }
        }
    }
    (String::from_utf8_lossy(&buf).to_string(), String::new())
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}
