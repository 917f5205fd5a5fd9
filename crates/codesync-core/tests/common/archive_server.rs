//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves fixed routes (archive bodies, redirects, bare status codes) and
//! records the path and `Authorization` header of every request.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Route {
    /// 200 OK with this body.
    Body(Vec<u8>),
    /// 301 Moved Permanently to this location (absolute or `/path`).
    Redirect(String),
    /// Empty response with this status code.
    Status(u16),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub path: String,
    pub authorization: Option<String>,
}

pub struct ArchiveServer {
    base: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl ArchiveServer {
    /// Starts a server in a background thread. Unknown paths get 404.
    /// The server runs until the process exits.
    pub fn start(routes: &[(&str, Route)]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let routes: Arc<HashMap<String, Route>> = Arc::new(
            routes
                .iter()
                .map(|(p, r)| (p.to_string(), r.clone()))
                .collect(),
        );
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let routes = Arc::clone(&routes);
                let recorded = Arc::clone(&recorded);
                thread::spawn(move || handle(stream, &routes, &recorded));
            }
        });
        Self {
            base: format!("http://127.0.0.1:{}", port),
            requests,
        }
    }

    /// Full URL for `path` (which starts with `/`).
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

fn handle(
    mut stream: TcpStream,
    routes: &HashMap<String, Route>,
    recorded: &Mutex<Vec<RecordedRequest>>,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));

    let mut request = Vec::new();
    let mut buf = [0u8; 4096];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }
    let request = match std::str::from_utf8(&request) {
        Ok(s) => s,
        Err(_) => return,
    };
    let (path, authorization) = parse_request(request);
    recorded.lock().unwrap().push(RecordedRequest {
        path: path.to_string(),
        authorization,
    });

    let (status, extra, body): (String, String, &[u8]) = match routes.get(path) {
        Some(Route::Body(body)) => ("200 OK".into(), String::new(), body.as_slice()),
        Some(Route::Redirect(location)) => (
            "301 Moved Permanently".into(),
            format!("Location: {}\r\n", location),
            &[],
        ),
        Some(Route::Status(code)) => (format!("{} Status", code), String::new(), &[]),
        None => ("404 Not Found".into(), String::new(), &[]),
    };
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n",
        status,
        body.len(),
        extra
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
}

/// Returns (path, Authorization header value exactly as sent after `": "`).
fn parse_request(request: &str) -> (&str, Option<String>) {
    let mut lines = request.lines();
    let path = lines
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .unwrap_or("/");
    let mut authorization = None;
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("authorization") {
                let value = value.strip_prefix(' ').unwrap_or(value);
                authorization = Some(value.to_string());
            }
        }
    }
    (path, authorization)
}
