//! WebSocket transport for relay communication.
//!
//! This module provides [`WsTransport`], which implements the [`Transport`]
//! trait over a `tokio-tungstenite` WebSocket, and [`WsConnector`], which
//! opens one per connection attempt. Both `ws://` and `wss://` URLs are
//! supported; TLS is handled by `rustls` inside `tokio-tungstenite`.
//!
//! # Example
//!
//! ```no_run
//! use catweb_core::transport::Transport;
//! use catweb_transport::WsTransport;
//!
//! # async fn example() -> catweb_core::Result<()> {
//! let mut transport = WsTransport::connect("wss://cat4web.localhost.r8acc.ru:34469").await?;
//! transport.send("1:freq:14074000").await?;
//! while let Some(frame) = transport.receive().await? {
//!     println!("{frame}");
//! }
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::error::Error as WsError;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use catweb_core::error::{Error, Result};
use catweb_core::transport::{Connector, Transport};

/// Default connection timeout (10 seconds).
///
/// Covers DNS, TCP, TLS and the WebSocket upgrade together.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport to the relay.
#[derive(Debug)]
pub struct WsTransport {
    /// The underlying WebSocket, `None` after `close()` or a remote close.
    stream: Option<WsStream>,
    /// The URL, for logging.
    url: String,
}

impl WsTransport {
    /// Connect to a WebSocket URL using the default timeout.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_timeout(url, DEFAULT_CONNECT_TIMEOUT).await
    }

    /// Connect to a WebSocket URL with a specified timeout.
    pub async fn connect_with_timeout(url: &str, timeout: Duration) -> Result<Self> {
        tracing::debug!(
            url = %url,
            timeout_ms = timeout.as_millis(),
            "Connecting to relay"
        );

        let (stream, response) = tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url))
            .await
            .map_err(|_| {
                tracing::error!(url = %url, "WebSocket connection timed out");
                Error::Timeout
            })?
            .map_err(|e| {
                tracing::error!(url = %url, error = %e, "WebSocket connection failed");
                map_ws_error(e)
            })?;

        tracing::info!(
            url = %url,
            status = response.status().as_u16(),
            "WebSocket connection established"
        );

        Ok(Self {
            stream: Some(stream),
            url: url.to_string(),
        })
    }

    /// Get the URL this transport was connected to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, frame: &str) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        tracing::trace!(url = %self.url, frame = %frame, "Sending frame");

        stream
            .send(Message::Text(frame.to_string()))
            .await
            .map_err(|e| {
                tracing::error!(url = %self.url, error = %e, "Failed to send frame");
                map_ws_error(e)
            })
    }

    async fn receive(&mut self) -> Result<Option<String>> {
        loop {
            let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

            match stream.next().await {
                None => {
                    tracing::debug!(url = %self.url, "WebSocket stream ended");
                    self.stream = None;
                    return Ok(None);
                }
                Some(Ok(Message::Text(text))) => {
                    tracing::trace!(url = %self.url, frame = %text, "Received frame");
                    return Ok(Some(text));
                }
                Some(Ok(Message::Binary(data))) => {
                    let text = String::from_utf8(data).map_err(|e| {
                        Error::Protocol(format!("binary frame is not UTF-8: {e}"))
                    })?;
                    return Ok(Some(text));
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(url = %self.url, frame = ?frame, "Relay closed the connection");
                    self.stream = None;
                    return Ok(None);
                }
                // Ping/pong replies are queued by tungstenite itself.
                Some(Ok(_)) => continue,
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => {
                    self.stream = None;
                    return Ok(None);
                }
                Some(Err(e)) => {
                    tracing::warn!(url = %self.url, error = %e, "WebSocket receive failed");
                    self.stream = None;
                    return Err(map_ws_error(e));
                }
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            tracing::debug!(url = %self.url, "Closing WebSocket connection");

            if let Err(e) = stream.close(None).await {
                tracing::warn!(
                    url = %self.url,
                    error = %e,
                    "Failed to close WebSocket cleanly (continuing anyway)"
                );
            }

            tracing::info!(url = %self.url, "WebSocket connection closed");
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        if self.stream.is_some() {
            tracing::debug!(url = %self.url, "WsTransport dropped, closing connection");
        }
    }
}

/// [`Connector`] that opens a [`WsTransport`] per connection attempt.
#[derive(Debug, Clone)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    /// Create a connector with the default connect timeout.
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Override the connect timeout.
    pub fn with_timeout(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>> {
        let transport = WsTransport::connect_with_timeout(url, self.connect_timeout).await?;
        Ok(Box::new(transport))
    }
}

/// Map a tungstenite error to the appropriate [`Error`] variant.
fn map_ws_error(e: WsError) -> Error {
    match e {
        WsError::ConnectionClosed | WsError::AlreadyClosed => Error::ConnectionLost,
        WsError::Io(io) => match io.kind() {
            std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::NotConnected
            | std::io::ErrorKind::ConnectionAborted => Error::ConnectionLost,
            std::io::ErrorKind::ConnectionRefused => {
                Error::Transport(format!("connection refused: {io}"))
            }
            _ => Error::Io(io),
        },
        other => Error::Transport(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catweb_test_harness::MockWsServer;

    #[tokio::test]
    async fn connect_send_receive() {
        let mut server = MockWsServer::new().await.unwrap();
        server.push(r#"{"auth":true}"#);
        let url = server.url();
        let mut received = server.start();

        let mut transport = WsTransport::connect(&url).await.unwrap();
        assert!(transport.is_connected());
        assert_eq!(transport.url(), url);

        let frame = transport.receive().await.unwrap();
        assert_eq!(frame.as_deref(), Some(r#"{"auth":true}"#));

        transport.send("token:abc").await.unwrap();
        assert_eq!(received.recv().await.as_deref(), Some("token:abc"));

        transport.close().await.unwrap();
        assert!(!transport.is_connected());
        server.wait().await.unwrap();
    }

    #[tokio::test]
    async fn remote_close_yields_none() {
        let mut server = MockWsServer::new().await.unwrap();
        server.push(r#"{"type":"ptt","rig":1,"value":1}"#);
        server.close_after_push(true);
        let url = server.url();
        let _received = server.start();

        let mut transport = WsTransport::connect(&url).await.unwrap();
        assert!(transport.receive().await.unwrap().is_some());
        assert!(transport.receive().await.unwrap().is_none());
        assert!(!transport.is_connected());
        server.wait().await.unwrap();
    }

    #[tokio::test]
    async fn send_after_close_fails() {
        let mut server = MockWsServer::new().await.unwrap();
        let url = server.url();
        let _received = server.start();

        let mut transport = WsTransport::connect(&url).await.unwrap();
        transport.close().await.unwrap();

        assert!(matches!(
            transport.send("1:freq:7074000").await,
            Err(Error::NotConnected)
        ));
        assert!(matches!(transport.receive().await, Err(Error::NotConnected)));
        // A second close is a no-op.
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn connect_refused() {
        // Bind and drop a listener so the port is very likely closed.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = WsTransport::connect(&format!("ws://127.0.0.1:{port}")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn connector_opens_transport() {
        let mut server = MockWsServer::new().await.unwrap();
        let url = server.url();
        let _received = server.start();

        let connector = WsConnector::default();
        let mut transport = connector.connect(&url).await.unwrap();
        assert!(transport.is_connected());
        transport.close().await.unwrap();
    }

    #[test]
    fn map_ws_error_connection_closed() {
        assert!(matches!(
            map_ws_error(WsError::ConnectionClosed),
            Error::ConnectionLost
        ));
    }

    #[test]
    fn map_ws_error_io_reset() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(matches!(map_ws_error(WsError::Io(io)), Error::ConnectionLost));
    }
}
