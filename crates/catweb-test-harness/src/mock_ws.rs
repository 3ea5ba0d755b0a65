//! Loopback WebSocket server for transport-level testing.
//!
//! [`MockWsServer`] listens on a random localhost port, accepts a single
//! WebSocket client, pushes a scripted list of text frames, and forwards
//! every text frame the client sends to a channel the test can read.
//!
//! # Example
//!
//! ```
//! use catweb_test_harness::MockWsServer;
//!
//! # async fn example() -> catweb_core::Result<()> {
//! let mut server = MockWsServer::new().await?;
//! server.push(r#"{"auth":true}"#);
//! let url = server.url();
//! let mut received = server.start();
//! // ... connect a WsTransport to `url` ...
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use catweb_core::error::{Error, Result};

/// A single-client WebSocket server for tests.
pub struct MockWsServer {
    /// Listener, moved into the server task on `start()`.
    listener: Option<TcpListener>,
    /// The bound address.
    addr: SocketAddr,
    /// Frames pushed to the client right after the upgrade.
    frames: Vec<String>,
    /// Whether to send a close frame after the scripted frames.
    close_after_push: bool,
    /// Handle to the server task once started.
    server_handle: Option<JoinHandle<std::result::Result<(), String>>>,
}

impl MockWsServer {
    /// Bind a new server on a random localhost port.
    pub async fn new() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| Error::Transport(format!("failed to bind mock WebSocket server: {e}")))?;
        let addr = listener.local_addr().map_err(Error::Io)?;
        Ok(Self {
            listener: Some(listener),
            addr,
            frames: Vec::new(),
            close_after_push: false,
            server_handle: None,
        })
    }

    /// Queue a text frame to push once the client has connected.
    pub fn push(&mut self, frame: &str) {
        self.frames.push(frame.to_string());
    }

    /// Close the connection from the server side after the pushed frames.
    pub fn close_after_push(&mut self, close: bool) {
        self.close_after_push = close;
    }

    /// `ws://` URL of this server.
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Start accepting a single client.
    ///
    /// Returns a channel carrying every text frame the client sends.
    pub fn start(&mut self) -> mpsc::UnboundedReceiver<String> {
        let (received_tx, received_rx) = mpsc::unbounded_channel();
        let listener = self.listener.take();
        let frames = std::mem::take(&mut self.frames);
        let close_after_push = self.close_after_push;

        let handle = tokio::spawn(async move {
            let listener = listener.ok_or_else(|| "server already started".to_string())?;
            let (stream, _) = listener
                .accept()
                .await
                .map_err(|e| format!("failed to accept connection: {e}"))?;
            let mut ws = tokio_tungstenite::accept_async(stream)
                .await
                .map_err(|e| format!("WebSocket upgrade failed: {e}"))?;

            for (i, frame) in frames.into_iter().enumerate() {
                ws.send(Message::Text(frame))
                    .await
                    .map_err(|e| format!("frame {i}: send error: {e}"))?;
            }

            if close_after_push {
                ws.close(None)
                    .await
                    .map_err(|e| format!("close error: {e}"))?;
            }

            while let Some(message) = ws.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        let _ = received_tx.send(text);
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(error = %e, "mock WebSocket client went away");
                        break;
                    }
                }
            }

            Ok(())
        });

        self.server_handle = Some(handle);
        received_rx
    }

    /// Wait for the server task to complete and return any errors.
    pub async fn wait(self) -> std::result::Result<(), String> {
        if let Some(handle) = self.server_handle {
            handle
                .await
                .map_err(|e| format!("server task panicked: {e}"))?
        } else {
            Ok(())
        }
    }
}
