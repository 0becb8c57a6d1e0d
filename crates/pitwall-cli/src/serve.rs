//! [`SnapshotServer`] – read-only JSON view of the racing data source.
//!
//! Lets a browser page or another process fetch the same snapshots the chat
//! agent sees.
//!
//! | Route | Reply |
//! |---|---|
//! | `GET /api/telemetry` | `{captured_at, situation, telemetry, track}` |
//! | `GET /api/tools` | JSON array of tool names |
//! | `GET /api/tools/{name}` | the one snapshot that tool returns |
//!
//! Each request opens its own [`Session`][pitwall_telemetry::Session], so the
//! source is connected only while a request is being answered. Requests are
//! answered one at a time; the provider has a single caller. A source that
//! cannot be reached answers `503` with `{"error": ...}`.

use std::net::SocketAddr;
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use pitwall_telemetry::SnapshotProvider;
use pitwall_types::PitwallError;

/// Longest accepted request head.
const MAX_HEAD: usize = 8 * 1024;

/// How long a client may take to send its request head.
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Serves snapshots from one provider over HTTP.
pub struct SnapshotServer {
    provider: SnapshotProvider,
}

/// Status code and JSON body of one reply.
#[derive(Debug, PartialEq)]
struct Reply {
    status: u16,
    body: String,
}

impl Reply {
    fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self { status, body },
            Err(e) => Self::error(500, &format!("serialization failed: {e}")),
        }
    }

    fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            body: serde_json::json!({ "error": message }).to_string(),
        }
    }

    fn reason(&self) -> &'static str {
        match self.status {
            200 => "OK",
            400 => "Bad Request",
            404 => "Not Found",
            405 => "Method Not Allowed",
            503 => "Service Unavailable",
            _ => "Internal Server Error",
        }
    }
}

impl SnapshotServer {
    pub fn new(provider: SnapshotProvider) -> Self {
        Self { provider }
    }

    /// Bind the listening socket on all interfaces.
    ///
    /// # Errors
    ///
    /// Returns [`PitwallError::Config`] if the port cannot be bound.
    pub async fn bind(port: u16) -> Result<TcpListener, PitwallError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        TcpListener::bind(addr)
            .await
            .map_err(|e| PitwallError::Config(format!("bind error on {addr}: {e}")))
    }

    /// Answer connections from `listener` until the future is dropped.
    pub async fn run(mut self, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    if let Err(e) = self.handle_connection(stream).await {
                        warn!(%peer, error = %e, "snapshot request failed");
                    }
                }
                Err(e) => warn!(error = %e, "accept error"),
            }
        }
    }

    async fn handle_connection(&mut self, mut stream: TcpStream) -> std::io::Result<()> {
        let reply = match tokio::time::timeout(READ_TIMEOUT, read_head(&mut stream)).await {
            Ok(Ok(head)) => match parse_request_line(&head) {
                Some((method, path)) => self.route(method, path).await,
                None => Reply::error(400, "malformed request line"),
            },
            Ok(Err(e)) => return Err(e),
            Err(_) => Reply::error(400, "request head not received in time"),
        };

        let response = format!(
            "HTTP/1.1 {} {}\r\n\
             Content-Type: application/json\r\n\
             Content-Length: {}\r\n\
             Access-Control-Allow-Origin: *\r\n\
             Connection: close\r\n\
             \r\n\
             {}",
            reply.status,
            reply.reason(),
            reply.body.len(),
            reply.body
        );
        stream.write_all(response.as_bytes()).await?;
        stream.shutdown().await
    }

    async fn route(&mut self, method: &str, path: &str) -> Reply {
        debug!(%method, %path, "snapshot request");
        if method != "GET" {
            return Reply::error(405, "only GET is supported");
        }
        let tool = match path {
            "/api/telemetry" | "/api/tools" => None,
            _ => match path.strip_prefix("/api/tools/") {
                Some(name) => Some(name),
                None => return Reply::error(404, &format!("no route for {path}")),
            },
        };

        let mut session = self.provider.session().await;
        if !session.is_live() {
            return Reply::error(
                503,
                &format!("telemetry source {} unavailable", session.source_description()),
            );
        }

        match (path, tool) {
            ("/api/telemetry", _) => Reply::json(200, &session.racing_info().await),
            ("/api/tools", _) => Reply::json(200, &session.available_tools().await),
            (_, Some("get_racing_situation")) => Reply::json(200, &session.race_situation().await),
            (_, Some("get_telemetry")) => Reply::json(200, &session.vehicle_telemetry().await),
            (_, Some("get_track_info")) => Reply::json(200, &session.track_info().await),
            (_, Some(other)) => Reply::error(404, &format!("unknown tool '{other}'")),
            (_, None) => Reply::error(404, &format!("no route for {path}")),
        }
    }
}

/// Announce the listener and serve until dropped.
pub async fn serve(server: SnapshotServer, listener: TcpListener) {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "snapshot server listening");
    }
    server.run(listener).await;
}

/// Read up to the blank line that ends the request head.
async fn read_head(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buf = vec![0u8; MAX_HEAD];
    let mut read = 0;
    while read < buf.len() {
        let n = stream.read(&mut buf[read..]).await?;
        if n == 0 {
            break;
        }
        read += n;
        if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buf[..read]).into_owned())
}

/// `("GET", "/api/telemetry")` from `GET /api/telemetry?x=1 HTTP/1.1`.
fn parse_request_line(head: &str) -> Option<(&str, &str)> {
    let mut parts = head.lines().next()?.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    if !parts.next()?.starts_with("HTTP/") {
        return None;
    }
    let path = target.split('?').next().unwrap_or(target);
    Some((method, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitwall_telemetry::SimConnector;
    use pitwall_telemetry::sim::HandleCounter;

    async fn start(sim: SimConnector) -> (SocketAddr, HandleCounter) {
        let handles = sim.handle_counter();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = SnapshotServer::new(SnapshotProvider::new(sim));
        tokio::spawn(server.run(listener));
        (addr, handles)
    }

    async fn request(addr: SocketAddr, method: &str, path: &str) -> (u16, serde_json::Value) {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let head = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(head.as_bytes()).await.unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();

        let status = raw.split_whitespace().nth(1).unwrap().parse().unwrap();
        let body = raw.split("\r\n\r\n").nth(1).unwrap();
        (status, serde_json::from_str(body).unwrap())
    }

    #[test]
    fn request_line_parsing() {
        assert_eq!(
            parse_request_line("GET /api/telemetry?fresh=1 HTTP/1.1\r\nHost: x\r\n\r\n"),
            Some(("GET", "/api/telemetry"))
        );
        assert_eq!(parse_request_line("GARBAGE"), None);
        assert_eq!(parse_request_line(""), None);
    }

    #[tokio::test]
    async fn telemetry_route_returns_all_three_snapshots() {
        let (addr, handles) = start(SimConnector::demo()).await;
        let (status, body) = request(addr, "GET", "/api/telemetry").await;

        assert_eq!(status, 200);
        assert_eq!(body["situation"]["lap"], 12);
        assert_eq!(body["telemetry"]["gear"], 6);
        assert_eq!(body["track"]["name"], "Silverstone Circuit");
        assert!(body["captured_at"].is_string());
        assert_eq!(handles.get(), 0, "session must close after each request");
    }

    #[tokio::test]
    async fn tool_routes_return_single_snapshots() {
        let (addr, _) = start(SimConnector::demo()).await;

        let (status, tools) = request(addr, "GET", "/api/tools").await;
        assert_eq!(status, 200);
        assert_eq!(tools[0], "get_racing_situation");

        let (status, track) = request(addr, "GET", "/api/tools/get_track_info").await;
        assert_eq!(status, 200);
        assert_eq!(track["layout"], "Grand Prix");

        let (status, body) = request(addr, "GET", "/api/tools/get_setup").await;
        assert_eq!(status, 404);
        assert!(body["error"].as_str().unwrap().contains("get_setup"));
    }

    #[tokio::test]
    async fn offline_source_answers_service_unavailable() {
        let (addr, _) = start(SimConnector::offline()).await;
        let (status, body) = request(addr, "GET", "/api/telemetry").await;
        assert_eq!(status, 503);
        assert!(body["error"].as_str().unwrap().contains("unavailable"));
    }

    #[tokio::test]
    async fn non_get_and_unknown_paths_are_rejected() {
        let (addr, handles) = start(SimConnector::demo()).await;
        assert_eq!(request(addr, "POST", "/api/telemetry").await.0, 405);
        assert_eq!(request(addr, "GET", "/").await.0, 404);
        assert_eq!(handles.get(), 0);
    }
}
