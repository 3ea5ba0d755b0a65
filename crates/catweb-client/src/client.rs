//! CAT4Web relay client facade.
//!
//! [`CatWebClient`] is the public surface of the relay session: it starts
//! and stops the background session task, answers state queries from the
//! rig cache without touching the network, queues frequency and mode
//! commands, and holds the host application's callbacks.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, error};

use catweb_core::{
    ConnectionState, Connector, Error, ModeFlags, RelayEvent, Result, RigId, RigStatus,
    TokenSource,
};

use crate::codec::{self, Command};
use crate::session::{self, SessionConfig, SessionHandle, Shared};
use crate::state::{RigAttribute, RigAttributes};

/// Default relay host.
pub const DEFAULT_HOST: &str = "cat4web.localhost.r8acc.ru";

/// Default plain WebSocket port.
pub const DEFAULT_PLAIN_PORT: u16 = 34468;

/// Default secure WebSocket port.
pub const DEFAULT_SECURE_PORT: u16 = 34469;

/// Default wait before reconnecting after an unexpected close (5 seconds).
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(5000);

/// Broadcast channel capacity for RelayEvent subscribers.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Options for configuring the relay connection.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Relay host name.
    pub host: String,
    /// Use `wss://` on the secure port instead of `ws://` on the plain port.
    pub secure: bool,
    /// Port for `ws://` connections.
    pub plain_port: u16,
    /// Port for `wss://` connections.
    pub secure_port: u16,
    /// Access-token endpoint.
    pub token_url: String,
    /// Wait between an unexpected close and the next connection attempt.
    pub reconnect_delay: Duration,
    /// Capacity of the [`RelayEvent`] broadcast channel.
    pub event_capacity: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            secure: true,
            plain_port: DEFAULT_PLAIN_PORT,
            secure_port: DEFAULT_SECURE_PORT,
            token_url: catweb_transport::DEFAULT_TOKEN_URL.to_string(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            event_capacity: EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl ClientOptions {
    /// The WebSocket URL of the relay.
    pub fn relay_url(&self) -> String {
        if self.secure {
            format!("wss://{}:{}", self.host, self.secure_port)
        } else {
            format!("ws://{}:{}", self.host, self.plain_port)
        }
    }
}

/// Client for the CAT4Web radio-control relay.
///
/// State queries read from a local cache that the session keeps current
/// from relay updates; they never block. The client is safe to share across
/// tasks and threads behind an `Arc`.
pub struct CatWebClient {
    shared: Arc<Shared>,
    options: ClientOptions,
    connector: Arc<dyn Connector>,
    token_source: Arc<dyn TokenSource>,
    session: Mutex<Option<SessionHandle>>,
}

impl CatWebClient {
    /// Create a client from explicit parts. See also
    /// [`CatWebBuilder`](crate::builder::CatWebBuilder).
    pub fn new(
        options: ClientOptions,
        connector: Arc<dyn Connector>,
        token_source: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared::new(options.event_capacity)),
            options,
            connector,
            token_source,
            session: Mutex::new(None),
        }
    }

    /// The options this client was built with.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    // -- Lifecycle ----------------------------------------------------------

    /// Start the relay session.
    ///
    /// Returns immediately; the session connects, authenticates, and
    /// reconnects in the background until [`disconnect`](Self::disconnect).
    ///
    /// Fails with [`Error::Unsupported`] outside a Tokio runtime and with
    /// [`Error::AlreadyConnected`] while a session is running, including
    /// while it waits to reconnect.
    pub fn connect(&self) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            error!(error = %e, "cannot connect to relay without a Tokio runtime");
            Error::Unsupported("no Tokio runtime available".into())
        })?;

        let mut session = crate::lock(&self.session);
        if session.is_some() {
            debug!("connect() ignored, session already running");
            return Err(Error::AlreadyConnected);
        }

        let session_id = {
            let mut inner = self.shared.lock();
            inner.session_id += 1;
            inner.state = ConnectionState::Connecting;
            inner.session_id
        };

        let config = SessionConfig {
            url: self.options.relay_url(),
            reconnect_delay: self.options.reconnect_delay,
            connector: Arc::clone(&self.connector),
            token_source: Arc::clone(&self.token_source),
        };
        *session = Some(session::spawn_session(
            &runtime,
            Arc::clone(&self.shared),
            config,
            session_id,
        ));
        Ok(())
    }

    /// Stop the relay session.
    ///
    /// Closes the transport and cancels any pending reconnect. Returns
    /// whether a session was running. The disconnect callback still fires
    /// once the session task observes the close.
    pub fn disconnect(&self) -> bool {
        let Some(handle) = crate::lock(&self.session).take() else {
            return false;
        };

        {
            let mut inner = self.shared.lock();
            inner.session_id += 1;
            inner.state = ConnectionState::Closed;
        }
        handle.cancel.cancel();
        debug!("relay session disconnect requested");
        true
    }

    /// Whether the relay has confirmed the current connection.
    pub fn is_active(&self) -> bool {
        self.connection_state() == ConnectionState::Authenticated
    }

    /// Current session lifecycle state.
    pub fn connection_state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    // -- Rig state ----------------------------------------------------------

    /// Last reported status of `rig`. `None` until reported.
    pub fn status(&self, rig: RigId) -> Option<RigStatus> {
        self.shared.lock().cache.status(rig)
    }

    /// Human-readable status of `rig`.
    ///
    /// `None` while the status is unset; `"Unknown status"` for a code this
    /// client does not recognize.
    pub fn status_text(&self, rig: RigId) -> Option<&'static str> {
        self.status(rig).map(|s| s.description())
    }

    /// Cached frequency of `rig` in hertz. `None` until reported or set.
    pub fn frequency(&self, rig: RigId) -> Option<u64> {
        self.shared.lock().cache.frequency(rig)
    }

    /// Last reported mode of `rig`. `None` until reported.
    pub fn mode(&self, rig: RigId) -> Option<ModeFlags> {
        self.shared.lock().cache.mode(rig)
    }

    /// Whether `rig` is transmitting. `false` until the relay reports PTT.
    pub fn ptt(&self, rig: RigId) -> bool {
        self.shared.lock().cache.ptt(rig)
    }

    /// Snapshot of everything known about `rig`.
    pub fn rig(&self, rig: RigId) -> Option<RigAttributes> {
        self.shared.lock().cache.get(rig).copied()
    }

    /// Rigs observed so far, in ascending order.
    pub fn rigs(&self) -> Vec<RigId> {
        self.shared.lock().cache.rigs()
    }

    // -- Commands -----------------------------------------------------------

    /// Tune `rig` to `freq_hz`.
    ///
    /// The cached frequency is updated immediately and is not rolled back
    /// if the command cannot be sent. Fails with [`Error::NotConnected`]
    /// when no session is connecting or authenticated. While connecting,
    /// the command waits until the access token has been sent.
    pub fn set_frequency(&self, rig: RigId, freq_hz: u64) -> Result<()> {
        self.shared
            .lock()
            .cache
            .update(rig, RigAttribute::Frequency(Some(freq_hz)));
        self.send_command(Command::SetFrequency { rig, freq_hz })
    }

    /// Change the modulation mode of `rig`.
    ///
    /// The cached mode is left alone until the relay echoes the change.
    pub fn set_mode(&self, rig: RigId, mode: ModeFlags) -> Result<()> {
        self.send_command(Command::SetMode { rig, mode })
    }

    fn send_command(&self, command: Command) -> Result<()> {
        let state = self.connection_state();
        if !matches!(
            state,
            ConnectionState::Connecting | ConnectionState::Authenticated
        ) {
            debug!(?command, %state, "command dropped, not connected");
            return Err(Error::NotConnected);
        }

        let session = crate::lock(&self.session);
        let handle = session.as_ref().ok_or(Error::NotConnected)?;
        handle
            .control_tx
            .send(codec::encode_command(&command))
            .map_err(|_| Error::NotConnected)
    }

    // -- Notifications ------------------------------------------------------

    /// Subscribe to every state change as a [`RelayEvent`] stream.
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.shared.subscribe()
    }

    /// Called each time the relay confirms a connection.
    pub fn on_connect<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared.callbacks.set_connect(Arc::new(f));
    }

    /// Called each time the relay connection closes, for any reason.
    pub fn on_disconnect<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared.callbacks.set_disconnect(Arc::new(f));
    }

    pub fn on_status_change<F>(&self, f: F)
    where
        F: Fn(RigId, Option<RigStatus>) + Send + Sync + 'static,
    {
        self.shared.callbacks.set_status(Arc::new(f));
    }

    pub fn on_frequency_change<F>(&self, f: F)
    where
        F: Fn(RigId, Option<u64>) + Send + Sync + 'static,
    {
        self.shared.callbacks.set_frequency(Arc::new(f));
    }

    pub fn on_mode_change<F>(&self, f: F)
    where
        F: Fn(RigId, Option<ModeFlags>) + Send + Sync + 'static,
    {
        self.shared.callbacks.set_mode(Arc::new(f));
    }

    pub fn on_ptt_change<F>(&self, f: F)
    where
        F: Fn(RigId, bool) + Send + Sync + 'static,
    {
        self.shared.callbacks.set_ptt(Arc::new(f));
    }
}

impl Drop for CatWebClient {
    fn drop(&mut self) {
        if let Some(handle) = crate::lock(&self.session).take() {
            handle.cancel.cancel();
        }
    }
}

impl std::fmt::Debug for CatWebClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatWebClient")
            .field("url", &self.options.relay_url())
            .field("state", &self.connection_state())
            .finish_non_exhaustive()
    }
}
