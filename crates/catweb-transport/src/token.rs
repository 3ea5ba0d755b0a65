//! HTTP access-token source.
//!
//! [`HttpTokenSource`] implements [`TokenSource`] by issuing
//! `POST <token_url>` with `Content-Type: application/x-www-form-urlencoded`
//! and an empty body. The relay's licence service answers `200` with a
//! JSON-encoded string token; any other status is passed through to the
//! handshake logic, which treats it as a rejected attempt.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

use catweb_core::error::{Error, Result};
use catweb_core::transport::{TokenResponse, TokenSource};

/// Default licence service endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://cat4web.r8acc.ru/licence/request";

/// Default request timeout (10 seconds).
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Access-token source backed by an HTTP client.
#[derive(Debug, Clone)]
pub struct HttpTokenSource {
    client: reqwest::Client,
    url: String,
}

impl HttpTokenSource {
    /// Create a token source for the given URL.
    pub fn new(url: &str) -> Result<Self> {
        Self::with_timeout(url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a token source with a custom request timeout.
    pub fn with_timeout(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    /// The licence service URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TokenSource for HttpTokenSource {
    async fn request_token(&self) -> Result<TokenResponse> {
        tracing::debug!(url = %self.url, "Requesting access token");

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout
                } else {
                    Error::Transport(format!("token request failed: {e}"))
                }
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("failed to read token response: {e}")))?;

        tracing::debug!(url = %self.url, status, "Access token response received");
        Ok(TokenResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response and hand back the raw request text.
    async fn one_shot_http(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/licence/request", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.flush().await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });

        (url, server)
    }

    #[tokio::test]
    async fn posts_form_request_and_returns_body() {
        let (url, server) = one_shot_http("200 OK", "\"abc123\"").await;

        let source = HttpTokenSource::new(&url).unwrap();
        assert_eq!(source.url(), url);
        let response = source.request_token().await.unwrap();
        assert_eq!(response, TokenResponse::new(200, "\"abc123\""));

        let request = server.await.unwrap().to_ascii_lowercase();
        assert!(request.starts_with("post /licence/request http/1.1"), "{request}");
        assert!(
            request.contains("content-type: application/x-www-form-urlencoded"),
            "{request}"
        );
    }

    #[tokio::test]
    async fn non_success_status_is_reported_not_raised() {
        let (url, server) = one_shot_http("403 Forbidden", "\"denied\"").await;

        let source = HttpTokenSource::new(&url).unwrap();
        let response = source.request_token().await.unwrap();
        assert_eq!(response.status, 403);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_service_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let source = HttpTokenSource::new(&format!("http://127.0.0.1:{port}/")).unwrap();
        assert!(source.request_token().await.is_err());
    }
}
