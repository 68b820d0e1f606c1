//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves one scripted route per path: a sequence of error statuses returned
//! before the body, and optionally a body cut short of its announced
//! Content-Length. Counts requests per path.

use std::collections::{HashMap, VecDeque};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct Route {
    pub body: Vec<u8>,
    /// Statuses answered (with an empty body) before the body is served.
    pub fail_first: VecDeque<u16>,
    /// Announce the full length but close after this many bytes, for the
    /// first `truncate_times` requests.
    pub truncate_to: Option<usize>,
    pub truncate_times: usize,
}

impl Route {
    pub fn ok(body: Vec<u8>) -> Self {
        Self {
            body,
            ..Self::default()
        }
    }

    pub fn failing(body: Vec<u8>, statuses: &[u16]) -> Self {
        Self {
            body,
            fail_first: statuses.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn truncated(body: Vec<u8>, keep: usize, times: usize) -> Self {
        Self {
            body,
            truncate_to: Some(keep),
            truncate_times: times,
            ..Self::default()
        }
    }
}

struct State {
    routes: HashMap<String, Route>,
    hits: HashMap<String, usize>,
}

/// Handle to a running server. Runs until the process exits.
#[derive(Clone)]
pub struct TestServer {
    base: String,
    state: Arc<Mutex<State>>,
}

impl TestServer {
    pub fn start(routes: Vec<(&str, Route)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(State {
            routes: routes
                .into_iter()
                .map(|(p, r)| (p.to_string(), r))
                .collect(),
            hits: HashMap::new(),
        }));
        let shared = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let state = Arc::clone(&shared);
                thread::spawn(move || handle(stream, &state));
            }
        });
        Self {
            base: format!("http://127.0.0.1:{}", port),
            state,
        }
    }

    /// Absolute URL for `path` (which starts with '/').
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn hits(&self, path: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .hits
            .get(path)
            .copied()
            .unwrap_or(0)
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        403 => "Forbidden",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

fn handle(mut stream: TcpStream, state: &Mutex<State>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    let path = request
        .lines()
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();

    // Decide the response while holding the lock, write it after.
    let (status, body, keep) = {
        let mut s = state.lock().unwrap();
        *s.hits.entry(path.clone()).or_default() += 1;
        match s.routes.get_mut(&path) {
            None => (404, Vec::new(), None),
            Some(route) => {
                if let Some(status) = route.fail_first.pop_front() {
                    (status, Vec::new(), None)
                } else if route.truncate_times > 0 {
                    route.truncate_times -= 1;
                    (200, route.body.clone(), route.truncate_to)
                } else {
                    (200, route.body.clone(), None)
                }
            }
        }
    };

    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
        status,
        reason(status),
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let send = keep.unwrap_or(body.len()).min(body.len());
    let _ = stream.write_all(&body[..send]);
    let _ = stream.flush();
}
