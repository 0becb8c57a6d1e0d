//! Network telemetry server source.
//!
//! [`HttpConnector`] talks to a telemetry server that runs next to the
//! simulator and serves its live fields as JSON:
//!
//! | Endpoint | Reply |
//! |---|---|
//! | `GET /fields` | flat JSON object of raw field values |
//! | `GET /tools` | JSON array of exposed read-operation names |
//!
//! A `503` reply means the simulator is up but no session is active. Every
//! transport or status failure maps to [`PitwallError::SourceUnavailable`].

use std::time::Duration;

use async_trait::async_trait;
use pitwall_types::PitwallError;
use tracing::debug;

use crate::source::{Connector, FieldMap, SourceHandle};

/// Default server address when none is configured.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:3000";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

fn unavailable(e: reqwest::Error) -> PitwallError {
    if e.status() == Some(reqwest::StatusCode::SERVICE_UNAVAILABLE) {
        PitwallError::SourceUnavailable("no active session on telemetry server".into())
    } else {
        PitwallError::SourceUnavailable(e.to_string())
    }
}

async fn get_fields(client: &reqwest::Client, base_url: &str) -> Result<FieldMap, PitwallError> {
    let url = format!("{base_url}/fields");
    debug!(%url, "fetching telemetry fields");
    client
        .get(&url)
        .send()
        .await
        .map_err(unavailable)?
        .error_for_status()
        .map_err(unavailable)?
        .json::<FieldMap>()
        .await
        .map_err(|e| PitwallError::SourceUnavailable(format!("malformed field payload: {e}")))
}

/// Opens links to a telemetry server over HTTP.
pub struct HttpConnector {
    base_url: String,
    timeout: Duration,
}

impl HttpConnector {
    /// Create a connector for `base_url` (e.g. `"http://localhost:3000"`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_URL, DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl Connector for HttpConnector {
    fn describe(&self) -> String {
        self.base_url.clone()
    }

    /// Fetch `/fields` once; success means a session is live.
    async fn open(&self) -> Result<Box<dyn SourceHandle>, PitwallError> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| PitwallError::SourceUnavailable(format!("http client: {e}")))?;
        get_fields(&client, &self.base_url).await?;
        Ok(Box::new(HttpHandle {
            client: Some(client),
            base_url: self.base_url.clone(),
        }))
    }
}

struct HttpHandle {
    /// `None` once closed.
    client: Option<reqwest::Client>,
    base_url: String,
}

impl HttpHandle {
    fn client(&self) -> Result<&reqwest::Client, PitwallError> {
        self.client
            .as_ref()
            .ok_or_else(|| PitwallError::SourceUnavailable("handle closed".into()))
    }
}

#[async_trait]
impl SourceHandle for HttpHandle {
    async fn poll(&mut self) -> Result<FieldMap, PitwallError> {
        get_fields(self.client()?, &self.base_url).await
    }

    async fn tools(&mut self) -> Result<Vec<String>, PitwallError> {
        let url = format!("{}/tools", self.base_url);
        self.client()?
            .get(&url)
            .send()
            .await
            .map_err(unavailable)?
            .error_for_status()
            .map_err(unavailable)?
            .json::<Vec<String>>()
            .await
            .map_err(|e| PitwallError::SourceUnavailable(format!("malformed tool list: {e}")))
    }

    fn close(&mut self) {
        self.client = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ConnectionState, SnapshotProvider};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// One canned reply per path; unknown paths answer 404.
    type Routes = Vec<(&'static str, u16, &'static str)>;

    /// Loopback telemetry server answering from `routes`.
    async fn stub_server(routes: Routes) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let routes = routes.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let mut read = 0;
                    while read < buf.len() {
                        let n = stream.read(&mut buf[read..]).await.unwrap_or(0);
                        if n == 0 {
                            break;
                        }
                        read += n;
                        if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                            break;
                        }
                    }
                    let head = String::from_utf8_lossy(&buf[..read]).to_string();
                    let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
                    let (status, body) = routes
                        .iter()
                        .find(|(p, _, _)| *p == path)
                        .map(|(_, s, b)| (*s, *b))
                        .unwrap_or((404, ""));
                    let reason = match status {
                        200 => "OK",
                        503 => "Service Unavailable",
                        _ => "Not Found",
                    };
                    let reply = format!(
                        "HTTP/1.1 {status} {reason}\r\n\
                         Content-Type: application/json\r\n\
                         Content-Length: {}\r\n\
                         Connection: close\r\n\
                         \r\n\
                         {body}",
                        body.len()
                    );
                    let _ = stream.write_all(reply.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });
        format!("http://{addr}")
    }

    fn connector(base_url: String) -> HttpConnector {
        HttpConnector::new(base_url, Duration::from_secs(5))
    }

    #[test]
    fn defaults_match_the_documented_server() {
        let connector = HttpConnector::default();
        assert_eq!(connector.base_url(), "http://localhost:3000");
        assert_eq!(connector.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let connector = HttpConnector::new("http://example.com:8080/", Duration::from_secs(60));
        assert_eq!(connector.base_url(), "http://example.com:8080");
        assert_eq!(connector.describe(), "http://example.com:8080");
    }

    #[tokio::test]
    async fn unreachable_server_fails_softly() {
        // Port 9 (discard) on loopback is not served in test environments.
        let connector = HttpConnector::new("http://127.0.0.1:9", Duration::from_secs(2));
        let mut provider = SnapshotProvider::new(connector);
        assert!(!provider.connect().await);
        assert_eq!(provider.state(), ConnectionState::Disconnected);
        assert!(provider.racing_info().await.track.name.is_none());
    }

    #[tokio::test]
    async fn live_server_fields_and_tools_reach_the_provider() {
        let base = stub_server(vec![
            ("/fields", 200, r#"{"lap": 5, "speed_kph": 210.0, "track_name": "Spa"}"#),
            ("/tools", 200, r#"["get_racing_situation", "get_track_info"]"#),
        ])
        .await;
        let mut provider = SnapshotProvider::new(connector(base));
        assert!(provider.connect().await);

        let info = provider.racing_info().await;
        assert_eq!(info.situation.lap, Some(5));
        assert_eq!(info.situation.speed_kph, Some(210.0));
        assert_eq!(info.track.name.as_deref(), Some("Spa"));
        assert_eq!(
            provider.available_tools().await,
            vec!["get_racing_situation".to_string(), "get_track_info".to_string()]
        );
    }

    #[tokio::test]
    async fn null_field_defaults_alone() {
        let base = stub_server(vec![(
            "/fields",
            200,
            r#"{"lap": 5, "position": null, "speed_kph": 210.0}"#,
        )])
        .await;
        let mut provider = SnapshotProvider::new(connector(base));
        assert!(provider.connect().await);

        let situation = provider.race_situation().await;
        assert_eq!(situation.lap, Some(5));
        assert_eq!(situation.speed_kph, Some(210.0));
        assert_eq!(situation.position, None);
    }

    #[tokio::test]
    async fn service_unavailable_means_no_active_session() {
        let base = stub_server(vec![("/fields", 503, "")]).await;
        let err = connector(base).open().await.err();
        assert_eq!(
            err,
            Some(PitwallError::SourceUnavailable(
                "no active session on telemetry server".into()
            ))
        );
    }

    #[tokio::test]
    async fn malformed_payload_is_unavailable() {
        let base = stub_server(vec![("/fields", 200, "[1, 2, 3]")]).await;
        match connector(base).open().await {
            Err(PitwallError::SourceUnavailable(msg)) => {
                assert!(msg.starts_with("malformed field payload"), "{msg}")
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("array payload must not open a session"),
        }
    }

    #[tokio::test]
    async fn missing_tools_endpoint_lists_nothing() {
        let base = stub_server(vec![("/fields", 200, r#"{"lap": 1}"#)]).await;
        let mut provider = SnapshotProvider::new(connector(base));
        assert!(provider.connect().await);
        assert!(provider.available_tools().await.is_empty());
        assert!(provider.is_connected());
    }
}
