//! Network access behind a narrow trait.
//!
//! Everything that talks to the network goes through [`Fetcher`]: the hub
//! listing, the model transfer and the LocalScore release download.
//! `HttpFetcher` is the real implementation over `reqwest`; `MockFetcher`
//! serves canned responses and records every URL it was asked for.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::DownloadError;

/// Log a progress line every this many bytes.
const PROGRESS_STEP: u64 = 256 * 1024 * 1024;

/// Trait for fetching remote content.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the whole body of `url` into memory.
    async fn get(&self, url: &str) -> Result<Bytes, DownloadError>;

    /// Stream the body of `url` into `dest`, returning the byte count.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, DownloadError>;
}

/// `reqwest`-backed fetcher.
pub struct HttpFetcher {
    client: reqwest::Client,
    bearer_token: Option<String>,
}

impl HttpFetcher {
    /// Create a fetcher that identifies itself with `user_agent`.
    pub fn new(user_agent: impl Into<String>) -> Result<Self, DownloadError> {
        let user_agent = user_agent.into();
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| DownloadError::Request {
                url: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            bearer_token: None,
        })
    }

    /// Send `Authorization: Bearer <token>` with every request.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response, DownloadError> {
        let mut request = self.client.get(url);
        if let Some(ref token) = self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| DownloadError::Request {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        if !response.status().is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, url: &str) -> Result<Bytes, DownloadError> {
        debug!(url, "GET");
        let response = self.send(url).await?;
        response.bytes().await.map_err(|e| DownloadError::Request {
            url: url.to_string(),
            message: format!("Failed to read response: {e}"),
        })
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        debug!(url, dest = %dest.display(), "Streaming download");
        let response = self.send(url).await?;
        let total = response.content_length();

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        let mut next_report = PROGRESS_STEP;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| match total {
                Some(expected) if written < expected => DownloadError::InvalidResponse {
                    url: url.to_string(),
                    message: format!("expected {expected} bytes, received {written}: {e}"),
                },
                _ => DownloadError::Request {
                    url: url.to_string(),
                    message: format!("Transfer interrupted: {e}"),
                },
            })?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;

            if written >= next_report {
                info!(bytes = written, total, "Downloading");
                next_report += PROGRESS_STEP;
            }
        }
        file.flush().await?;

        if let Some(expected) = total
            && expected != written
        {
            return Err(DownloadError::InvalidResponse {
                url: url.to_string(),
                message: format!("expected {expected} bytes, received {written}"),
            });
        }
        Ok(written)
    }
}

/// A mock fetcher for testing.
pub struct MockFetcher {
    responses: Mutex<HashMap<String, Result<Bytes, u16>>>,
    calls: Mutex<Vec<String>>,
}

impl MockFetcher {
    /// Create a mock with no responses; every URL answers 404.
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Serve `body` for `url`.
    pub fn with_response(self, url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.into(), Ok(body.into()));
        self
    }

    /// Answer `url` with an HTTP error status.
    pub fn with_status(self, url: impl Into<String>, status: u16) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.into(), Err(status));
        self
    }

    /// URLs requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn respond(&self, url: &str) -> Result<Bytes, DownloadError> {
        self.calls.lock().unwrap().push(url.to_string());
        match self.responses.lock().unwrap().get(url) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(status)) => Err(DownloadError::Status {
                url: url.to_string(),
                status: *status,
            }),
            None => Err(DownloadError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn get(&self, url: &str) -> Result<Bytes, DownloadError> {
        self.respond(url)
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        let body = self.respond(url)?;
        tokio::fs::write(dest, &body).await?;
        Ok(body.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_serves_and_records() {
        let fetcher = MockFetcher::new().with_response("https://a/x", "hello");
        let body = fetcher.get("https://a/x").await.unwrap();
        assert_eq!(&body[..], b"hello");
        assert_eq!(fetcher.calls(), vec!["https://a/x".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_unknown_url_is_404() {
        let fetcher = MockFetcher::new();
        let err = fetcher.get("https://a/missing").await.unwrap_err();
        assert!(matches!(err, DownloadError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_mock_status_override() {
        let fetcher = MockFetcher::new().with_status("https://a/private", 401);
        let err = fetcher.get("https://a/private").await.unwrap_err();
        assert!(matches!(err, DownloadError::Status { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_mock_download_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        let fetcher = MockFetcher::new().with_response("https://a/bin", vec![1u8, 2, 3]);
        let n = fetcher.download("https://a/bin", &dest).await.unwrap();
        assert_eq!(n, 3);
        assert_eq!(std::fs::read(&dest).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_http_fetcher_builds() {
        let fetcher = HttpFetcher::new("llm-bench/test").unwrap();
        assert!(fetcher.bearer_token.is_none());
        let fetcher = fetcher.with_bearer_token("hf_abc");
        assert_eq!(fetcher.bearer_token.as_deref(), Some("hf_abc"));
    }

    mod http {
        use super::*;
        use wiremock::matchers::{header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        async fn setup_mock_server(path_url: &str, body: Vec<u8>) -> MockServer {
            let mock_server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path(path_url))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
                .mount(&mock_server)
                .await;
            mock_server
        }

        #[tokio::test]
        async fn test_http_status_error() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/gone.gguf"))
                .respond_with(ResponseTemplate::new(404))
                .mount(&server)
                .await;

            let fetcher = HttpFetcher::new("llm-bench/test").unwrap();
            let url = format!("{}/gone.gguf", server.uri());
            let err = fetcher.get(&url).await.unwrap_err();
            assert!(matches!(err, DownloadError::Status { status: 404, url: ref u } if *u == url));

            let dir = tempfile::tempdir().unwrap();
            let err = fetcher
                .download(&url, &dir.path().join("gone.gguf"))
                .await
                .unwrap_err();
            assert!(matches!(err, DownloadError::Status { status: 404, .. }));
        }

        #[tokio::test]
        async fn test_http_download_streams_to_disk() {
            let body: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
            let server = setup_mock_server("/m.gguf", body.clone()).await;

            let dir = tempfile::tempdir().unwrap();
            let dest = dir.path().join("m.gguf");
            let fetcher = HttpFetcher::new("llm-bench/test").unwrap();
            let written = fetcher
                .download(&format!("{}/m.gguf", server.uri()), &dest)
                .await
                .unwrap();

            assert_eq!(written, body.len() as u64);
            assert_eq!(std::fs::read(&dest).unwrap(), body);
        }

        #[tokio::test]
        async fn test_http_get_returns_body() {
            let server = setup_mock_server("/api/models/org/repo", b"{}".to_vec()).await;
            let fetcher = HttpFetcher::new("llm-bench/test").unwrap();
            let body = fetcher
                .get(&format!("{}/api/models/org/repo", server.uri()))
                .await
                .unwrap();
            assert_eq!(&body[..], b"{}");
        }

        #[tokio::test]
        async fn test_http_sends_bearer_token_and_user_agent() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/private.gguf"))
                .and(header("authorization", "Bearer hf_secret"))
                .and(header("user-agent", "llm-bench/test"))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
                .mount(&server)
                .await;
            let url = format!("{}/private.gguf", server.uri());

            let anonymous = HttpFetcher::new("llm-bench/test").unwrap();
            let err = anonymous.get(&url).await.unwrap_err();
            assert!(matches!(err, DownloadError::Status { status: 404, .. }));

            let authorized = HttpFetcher::new("llm-bench/test")
                .unwrap()
                .with_bearer_token("hf_secret");
            assert_eq!(&authorized.get(&url).await.unwrap()[..], b"ok");
        }

        /// Serve one response that announces more bytes than it sends.
        async fn serve_truncated(announced: usize, body: &'static [u8]) -> String {
            use tokio::io::{AsyncReadExt, AsyncWriteExt};

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut buf).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);
                }
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {announced}\r\nConnection: close\r\n\r\n"
                );
                socket.write_all(head.as_bytes()).await.unwrap();
                socket.write_all(body).await.unwrap();
                socket.shutdown().await.unwrap();
            });
            format!("http://{addr}/m.gguf")
        }

        #[tokio::test]
        async fn test_http_content_length_mismatch() {
            let url = serve_truncated(100, b"short").await;
            let dir = tempfile::tempdir().unwrap();
            let fetcher = HttpFetcher::new("llm-bench/test").unwrap();

            let err = fetcher
                .download(&url, &dir.path().join("m.gguf"))
                .await
                .unwrap_err();
            match err {
                DownloadError::InvalidResponse { message, .. } => {
                    assert!(message.contains("expected 100 bytes"), "{message}");
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }
}
