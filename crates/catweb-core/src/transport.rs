//! Transport traits for relay communication.
//!
//! The relay session needs two channels: a persistent, message-oriented
//! [`Transport`] (a WebSocket in production) opened through a
//! [`Connector`], and a one-shot request/response [`TokenSource`] used to
//! obtain the access token for each connection attempt.
//!
//! The session logic in `catweb-client` only sees these traits, enabling both
//! real network operation via `catweb-transport` and deterministic testing
//! with the mocks in `catweb-test-harness`.

use async_trait::async_trait;

use crate::error::Result;

/// Asynchronous text-frame transport to the relay.
#[async_trait]
pub trait Transport: Send {
    /// Send one text frame.
    async fn send(&mut self, frame: &str) -> Result<()>;

    /// Wait for the next text frame.
    ///
    /// Returns `Ok(None)` once the remote side has closed the connection.
    /// Implementations must be cancel-safe: dropping the returned future
    /// before it completes must not lose a frame.
    async fn receive(&mut self) -> Result<Option<String>>;

    /// Close the connection.
    ///
    /// After calling `close()`, subsequent `send()` and `receive()` calls
    /// should return [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}

/// Opens [`Transport`]s to a relay URL.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new transport to `url` (`ws://host:port` or `wss://host:port`).
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>>;
}

/// Raw answer to an access-token request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body, a JSON-encoded token on success.
    pub body: String,
}

impl TokenResponse {
    /// Build a response from a status code and body.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Issues access-token requests over a request/response channel.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Request a fresh access token.
    ///
    /// Returns `Err` only when no response was received at all; any HTTP
    /// status, including failures, is reported through [`TokenResponse`].
    async fn request_token(&self) -> Result<TokenResponse>;
}
