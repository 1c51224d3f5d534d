//! Remote mark recorder over HTTP using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    marks::{MarkRequest, MarkResult, RemoteMarkRecorder},
};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts marks as JSON to a single endpoint.
///
/// Body: `{"actorId": .., "userId": .., "songId": .., "mark": ..}`. A 2xx
/// response body is parsed as [`MarkResult`]; an empty body yields the
/// default result. One attempt per call.
pub struct HttpMarkRecorder {
    client: Client,
    endpoint: String,
    bearer_token: Option<String>,
}

impl HttpMarkRecorder {
    /// Recorder posting to `endpoint` with a default client.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("teaser-player-core/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(client, endpoint))
    }

    pub fn with_client(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            bearer_token: None,
        }
    }

    /// Send `Authorization: Bearer <token>` with every mark.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RemoteMarkRecorder for HttpMarkRecorder {
    fn name(&self) -> &str {
        "http"
    }

    async fn record(&self, request: MarkRequest) -> Result<MarkResult> {
        debug!(
            endpoint = %self.endpoint,
            song_id = %request.song_id,
            mark = %request.kind,
            "Posting mark"
        );

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                BridgeError::Remote(format!("{} timed out", self.endpoint))
            } else {
                BridgeError::Remote(format!("{}: {}", self.endpoint, e))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BridgeError::Remote(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(BridgeError::Remote(format!(
                "{} returned HTTP {}",
                self.endpoint,
                status.as_u16()
            )));
        }

        if body.trim().is_empty() {
            return Ok(MarkResult::default());
        }

        serde_json::from_str(&body)
            .map_err(|e| BridgeError::Remote(format!("Malformed mark result: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::marks::MarkKind;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serves one request with `status` and `body`, returning the raw request.
    async fn one_shot_server(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/marks", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];

            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw);
                if let Some(split) = text.find("\r\n\r\n") {
                    let length = text[..split]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if raw.len() >= split + 4 + length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8(raw).unwrap()
        });

        (url, server)
    }

    #[tokio::test]
    async fn test_posts_wire_body_and_parses_result() {
        let (url, server) = one_shot_server("200 OK", r#"{"totalMarks":12,"uniqueActors":4}"#).await;
        let recorder = HttpMarkRecorder::new(url).unwrap().with_bearer_token("secret");

        let result = recorder
            .record(MarkRequest::new("anon-1", Some("user-9".into()), "42", MarkKind::Play))
            .await
            .unwrap();

        assert_eq!(result.total_marks, Some(12));
        assert_eq!(result.extra.get("uniqueActors"), Some(&serde_json::json!(4)));

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /marks"));
        assert!(raw.to_ascii_lowercase().contains("authorization: bearer secret"));
        let body = &raw[raw.find("\r\n\r\n").unwrap() + 4..];
        let json: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "actorId": "anon-1",
                "userId": "user-9",
                "songId": "42",
                "mark": "play"
            })
        );
    }

    #[tokio::test]
    async fn test_empty_body_is_default_result() {
        let (url, server) = one_shot_server("200 OK", "").await;
        let recorder = HttpMarkRecorder::new(url).unwrap();

        let result = recorder
            .record(MarkRequest::new("anon-1", None, "7", MarkKind::Teaser))
            .await
            .unwrap();

        assert_eq!(result, MarkResult::default());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_error_status_is_remote_error() {
        let (url, server) = one_shot_server("503 Service Unavailable", "").await;
        let recorder = HttpMarkRecorder::new(url).unwrap();

        let err = recorder
            .record(MarkRequest::new("anon-1", None, "7", MarkKind::Play))
            .await
            .unwrap_err();

        assert!(matches!(err, BridgeError::Remote(ref msg) if msg.contains("503")));
        server.await.unwrap();
    }

    #[test]
    fn test_name_and_endpoint() {
        let recorder = HttpMarkRecorder::with_client(Client::new(), "https://api.example.com/marks");
        assert_eq!(recorder.name(), "http");
        assert_eq!(recorder.endpoint(), "https://api.example.com/marks");
    }
}
