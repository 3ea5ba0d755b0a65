//! In-memory mock relay for deterministic session testing.
//!
//! [`MockConnector`] implements [`Connector`] by handing out channel-backed
//! [`MockTransport`]s. Every connection the client opens shows up on the
//! paired [`MockRelay`] as a [`MockConnection`], from which a test can push
//! inbound frames, read the frames the client sent, and close the
//! connection from the relay side.
//!
//! No sockets or timers are involved, so tests driving a session through
//! this mock work under `#[tokio::test(start_paused = true)]`.
//!
//! # Example
//!
//! ```
//! use catweb_test_harness::MockConnector;
//! use catweb_core::transport::{Connector, Transport};
//!
//! # async fn example() -> catweb_core::Result<()> {
//! let (connector, mut relay) = MockConnector::new();
//! let mut transport = connector.connect("ws://relay.test:34468").await?;
//! let conn = relay.accept().await.unwrap();
//!
//! conn.push(r#"{"auth":true}"#);
//! assert_eq!(transport.receive().await?.as_deref(), Some(r#"{"auth":true}"#));
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use catweb_core::error::{Error, Result};
use catweb_core::transport::{Connector, Transport};

/// Frames travelling from the relay to the client.
#[derive(Debug)]
enum Inbound {
    Frame(String),
    Close,
}

/// Shared bookkeeping between the connector and the relay handle.
#[derive(Debug, Default)]
struct RelayState {
    /// Number of `connect()` calls seen.
    attempts: AtomicUsize,
    /// Scripted failures for upcoming `connect()` calls.
    failures: Mutex<VecDeque<String>>,
    /// URLs requested, in order.
    urls: Mutex<Vec<String>>,
}

/// A [`Connector`] that opens in-memory connections to a [`MockRelay`].
#[derive(Debug, Clone)]
pub struct MockConnector {
    state: Arc<RelayState>,
    accept_tx: mpsc::UnboundedSender<MockConnection>,
}

impl MockConnector {
    /// Create a connector and the relay handle that observes its connections.
    pub fn new() -> (Self, MockRelay) {
        let state = Arc::new(RelayState::default());
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        (
            MockConnector {
                state: Arc::clone(&state),
                accept_tx,
            },
            MockRelay { state, accept_rx },
        )
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>> {
        self.state.attempts.fetch_add(1, Ordering::SeqCst);
        lock(&self.state.urls).push(url.to_string());

        if let Some(reason) = lock(&self.state.failures).pop_front() {
            tracing::debug!(url = %url, reason = %reason, "mock relay refusing connection");
            return Err(Error::Transport(reason));
        }

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let client_closed = Arc::new(AtomicBool::new(false));

        let connection = MockConnection {
            url: url.to_string(),
            inbound_tx,
            sent_rx,
            client_closed: Arc::clone(&client_closed),
        };
        self.accept_tx
            .send(connection)
            .map_err(|_| Error::Transport("mock relay handle dropped".into()))?;

        Ok(Box::new(MockTransport {
            inbound_rx,
            sent_tx,
            client_closed,
            connected: true,
        }))
    }
}

/// Test-side handle observing the connections opened by a [`MockConnector`].
#[derive(Debug)]
pub struct MockRelay {
    state: Arc<RelayState>,
    accept_rx: mpsc::UnboundedReceiver<MockConnection>,
}

impl MockRelay {
    /// Wait for the client to open the next connection.
    ///
    /// Returns `None` once every [`MockConnector`] clone has been dropped.
    pub async fn accept(&mut self) -> Option<MockConnection> {
        self.accept_rx.recv().await
    }

    /// Take the next connection if one has already been opened.
    pub fn try_accept(&mut self) -> Option<MockConnection> {
        self.accept_rx.try_recv().ok()
    }

    /// Make the next `connect()` call fail with a transport error.
    pub fn fail_next_connect(&self, reason: &str) {
        lock(&self.state.failures).push_back(reason.to_string());
    }

    /// Number of `connect()` calls seen so far, successful or not.
    pub fn connect_attempts(&self) -> usize {
        self.state.attempts.load(Ordering::SeqCst)
    }

    /// URLs passed to `connect()`, in order.
    pub fn urls(&self) -> Vec<String> {
        lock(&self.state.urls).clone()
    }
}

/// Relay side of one mock connection.
#[derive(Debug)]
pub struct MockConnection {
    url: String,
    inbound_tx: mpsc::UnboundedSender<Inbound>,
    sent_rx: mpsc::UnboundedReceiver<String>,
    client_closed: Arc<AtomicBool>,
}

impl MockConnection {
    /// The URL the client connected to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Deliver a text frame to the client.
    pub fn push(&self, frame: &str) {
        let _ = self.inbound_tx.send(Inbound::Frame(frame.to_string()));
    }

    /// Close the connection from the relay side.
    pub fn close(&self) {
        let _ = self.inbound_tx.send(Inbound::Close);
    }

    /// Wait for the next frame the client sent.
    ///
    /// Returns `None` once the client transport has been dropped and all
    /// sent frames were consumed.
    pub async fn next_sent(&mut self) -> Option<String> {
        self.sent_rx.recv().await
    }

    /// Take the next frame the client sent, if one is already queued.
    pub fn try_next_sent(&mut self) -> Option<String> {
        self.sent_rx.try_recv().ok()
    }

    /// Whether the client called `close()` on its transport.
    pub fn closed_by_client(&self) -> bool {
        self.client_closed.load(Ordering::SeqCst)
    }
}

/// Client side of one mock connection.
#[derive(Debug)]
pub struct MockTransport {
    inbound_rx: mpsc::UnboundedReceiver<Inbound>,
    sent_tx: mpsc::UnboundedSender<String>,
    client_closed: Arc<AtomicBool>,
    connected: bool,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, frame: &str) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        self.sent_tx
            .send(frame.to_string())
            .map_err(|_| Error::ConnectionLost)
    }

    async fn receive(&mut self) -> Result<Option<String>> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        match self.inbound_rx.recv().await {
            Some(Inbound::Frame(frame)) => Ok(Some(frame)),
            Some(Inbound::Close) | None => {
                self.connected = false;
                Ok(None)
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.connected {
            self.connected = false;
            self.client_closed.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_flow_both_ways() {
        let (connector, mut relay) = MockConnector::new();
        let mut transport = connector.connect("ws://relay.test:34468").await.unwrap();
        let mut conn = relay.accept().await.unwrap();
        assert_eq!(conn.url(), "ws://relay.test:34468");

        conn.push("hello");
        assert_eq!(transport.receive().await.unwrap().as_deref(), Some("hello"));

        transport.send("1:freq:7074000").await.unwrap();
        assert_eq!(conn.next_sent().await.as_deref(), Some("1:freq:7074000"));
    }

    #[tokio::test]
    async fn relay_close_ends_receive() {
        let (connector, mut relay) = MockConnector::new();
        let mut transport = connector.connect("ws://relay.test:34468").await.unwrap();
        let conn = relay.accept().await.unwrap();

        conn.close();
        assert!(transport.receive().await.unwrap().is_none());
        assert!(!transport.is_connected());
        assert!(!conn.closed_by_client());
    }

    #[tokio::test]
    async fn client_close_is_visible_to_relay() {
        let (connector, mut relay) = MockConnector::new();
        let mut transport = connector.connect("ws://relay.test:34468").await.unwrap();
        let conn = relay.accept().await.unwrap();

        transport.close().await.unwrap();
        assert!(conn.closed_by_client());
        assert!(matches!(
            transport.send("x").await,
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn scripted_connect_failure() {
        let (connector, mut relay) = MockConnector::new();
        relay.fail_next_connect("refused");

        assert!(connector.connect("ws://relay.test:1").await.is_err());
        assert!(relay.try_accept().is_none());
        assert!(connector.connect("ws://relay.test:1").await.is_ok());
        assert!(relay.try_accept().is_some());
        assert_eq!(relay.connect_attempts(), 2);
        assert_eq!(relay.urls().len(), 2);
    }
}
