//! Relay session task.
//!
//! One tokio task per session owns the relay transport exclusively. It opens
//! the connection, drives the token handshake, decodes inbound frames into
//! the shared rig cache, forwards outbound command frames, and reconnects
//! after a fixed delay whenever the connection ends without a disconnect.
//!
//! # Lifecycle
//!
//! ```text
//! Idle --connect()--> Connecting --{"auth":true}--> Authenticated
//!                         ^                              |
//!                         |                        close / error
//!                         |                              v
//!                         +------ reconnect delay ---- Closed
//! ```
//!
//! `disconnect()` fires the cancellation token, which ends the task from any
//! of these states, including the reconnect wait.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use catweb_core::{
    ConnectionState, Connector, RelayEvent, RigId, TokenSource, Transport,
};

use crate::callbacks::Callbacks;
use crate::codec::{self, InboundMessage};
use crate::handshake::{self, TokenOutcome};
use crate::state::{RigAttribute, RigStateCache};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// State guarded by the shared mutex.
#[derive(Debug, Default)]
pub(crate) struct Inner {
    pub cache: RigStateCache,
    pub state: ConnectionState,
    /// Id of the session allowed to write `state` and `cache`.
    pub session_id: u64,
}

/// State shared between the client facade and the session task.
///
/// The mutex is never held across an `.await` or while callbacks run.
#[derive(Debug)]
pub(crate) struct Shared {
    inner: Mutex<Inner>,
    pub callbacks: Callbacks,
    event_tx: broadcast::Sender<RelayEvent>,
}

impl Shared {
    pub fn new(event_capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(event_capacity.max(1));
        Self {
            inner: Mutex::new(Inner::default()),
            callbacks: Callbacks::default(),
            event_tx,
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Inner> {
        crate::lock(&self.inner)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.event_tx.subscribe()
    }

    /// Fire the matching callback, then broadcast the event.
    pub fn emit(&self, event: RelayEvent) {
        self.callbacks.dispatch(&event);
        let _ = self.event_tx.send(event);
    }

    /// Set the connection state if `session_id` is still current.
    fn set_state(&self, session_id: u64, state: ConnectionState) -> bool {
        let mut inner = self.lock();
        if inner.session_id != session_id {
            return false;
        }
        inner.state = state;
        true
    }

    /// Write one rig attribute if `session_id` is still current.
    fn apply(&self, session_id: u64, rig: RigId, attribute: RigAttribute) -> bool {
        let mut inner = self.lock();
        if inner.session_id != session_id {
            return false;
        }
        inner.cache.update(rig, attribute);
        true
    }
}

// ---------------------------------------------------------------------------
// Spawn
// ---------------------------------------------------------------------------

/// Everything a session needs to reach the relay.
#[derive(Clone)]
pub(crate) struct SessionConfig {
    /// `ws://` or `wss://` relay URL.
    pub url: String,
    /// Wait between a lost connection and the next attempt.
    pub reconnect_delay: Duration,
    pub connector: Arc<dyn Connector>,
    pub token_source: Arc<dyn TokenSource>,
}

/// Handle to a running session task. Stored inside the client.
pub(crate) struct SessionHandle {
    /// Outbound command frames.
    pub control_tx: mpsc::UnboundedSender<String>,
    /// Fired by `disconnect()`.
    pub cancel: CancellationToken,
    /// Join handle for the session task.
    pub task: JoinHandle<()>,
}

/// Spawn the session task on `runtime`.
pub(crate) fn spawn_session(
    runtime: &tokio::runtime::Handle,
    shared: Arc<Shared>,
    config: SessionConfig,
    session_id: u64,
) -> SessionHandle {
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let (token_tx, token_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let session = Session {
        shared,
        config,
        session_id,
        control_rx,
        token_tx,
        token_rx,
        cancel: cancel.clone(),
        generation: 0,
        attempt: 0,
        token_sent: false,
        authenticated: false,
    };
    let task = runtime.spawn(session.run());

    SessionHandle {
        control_tx,
        cancel,
        task,
    }
}

// ---------------------------------------------------------------------------
// Session loop
// ---------------------------------------------------------------------------

/// How one connection attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionEnd {
    /// `disconnect()` was called.
    Cancelled,
    /// The relay closed, the transport failed, or the handshake was refused.
    Lost,
}

struct Session {
    shared: Arc<Shared>,
    config: SessionConfig,
    session_id: u64,
    control_rx: mpsc::UnboundedReceiver<String>,
    token_tx: mpsc::UnboundedSender<TokenOutcome>,
    token_rx: mpsc::UnboundedReceiver<TokenOutcome>,
    cancel: CancellationToken,
    /// Current connection attempt; token results from older ones are stale.
    generation: u64,
    /// Reconnects since the last successful authentication.
    attempt: u32,
    /// Whether the token frame went out on the current connection. Commands
    /// are held back until it has.
    token_sent: bool,
    /// Whether the current connection has been confirmed.
    authenticated: bool,
}

impl Session {
    async fn run(mut self) {
        debug!(session = self.session_id, url = %self.config.url, "relay session started");

        loop {
            self.generation += 1;
            self.token_sent = false;
            self.authenticated = false;
            self.shared
                .set_state(self.session_id, ConnectionState::Connecting);

            let connector = Arc::clone(&self.config.connector);
            let end = tokio::select! {
                biased;

                _ = self.cancel.cancelled() => ConnectionEnd::Cancelled,

                result = connector.connect(&self.config.url) => match result {
                    Ok(transport) => self.run_connection(transport).await,
                    Err(e) => {
                        warn!(url = %self.config.url, error = %e, "relay connection failed");
                        ConnectionEnd::Lost
                    }
                },
            };

            self.shared.set_state(self.session_id, ConnectionState::Closed);
            self.discard_pending_commands();
            self.shared.emit(RelayEvent::Disconnected);

            if end == ConnectionEnd::Cancelled {
                break;
            }

            debug!(
                delay_ms = self.config.reconnect_delay.as_millis(),
                "scheduling reconnect"
            );
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
            }

            self.attempt += 1;
            info!(attempt = self.attempt, "reconnecting to relay");
            self.shared.emit(RelayEvent::Reconnecting {
                attempt: self.attempt,
            });
        }

        debug!(session = self.session_id, "relay session ended");
    }

    /// Drive one open transport until it closes or the session is cancelled.
    ///
    /// Uses `tokio::select! { biased; }` to prioritize:
    /// 1. Cancellation
    /// 2. Handshake completion
    /// 3. Outbound command frames, once the token frame has been sent
    /// 4. Inbound relay frames
    async fn run_connection(&mut self, mut transport: Box<dyn Transport>) -> ConnectionEnd {
        debug!(generation = self.generation, "relay transport open");
        handshake::spawn_token_fetch(
            Arc::clone(&self.config.token_source),
            self.generation,
            self.token_tx.clone(),
        );

        let end = loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!("relay session cancelled");
                    break ConnectionEnd::Cancelled;
                }

                Some(outcome) = self.token_rx.recv() => {
                    if outcome.generation != self.generation {
                        debug!(
                            stale = outcome.generation,
                            current = self.generation,
                            "ignoring stale access token"
                        );
                        continue;
                    }
                    match outcome.result {
                        Ok(frame) => {
                            trace!("sending access token");
                            if let Err(e) = transport.send(&frame).await {
                                warn!(error = %e, "failed to send access token");
                                break ConnectionEnd::Lost;
                            }
                            self.token_sent = true;
                        }
                        Err(e) => {
                            error!(error = %e, "could not get access key");
                            break ConnectionEnd::Lost;
                        }
                    }
                }

                Some(frame) = self.control_rx.recv(), if self.token_sent => {
                    trace!(frame = %frame, "sending command");
                    if let Err(e) = transport.send(&frame).await {
                        warn!(error = %e, "failed to send command");
                        break ConnectionEnd::Lost;
                    }
                }

                received = transport.receive() => match received {
                    Ok(Some(frame)) => self.handle_frame(&frame),
                    Ok(None) => {
                        info!("relay closed the connection");
                        break ConnectionEnd::Lost;
                    }
                    Err(e) => {
                        warn!(error = %e, "relay connection lost");
                        break ConnectionEnd::Lost;
                    }
                },
            }
        };

        if transport.is_connected() {
            if let Err(e) = transport.close().await {
                debug!(error = %e, "error closing relay transport");
            }
        }
        end
    }

    /// Decode one inbound frame and apply it.
    fn handle_frame(&mut self, frame: &str) {
        let message = match codec::decode_message(frame) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "dropping undecodable relay frame");
                return;
            }
        };

        let (rig, attribute, event) = match message {
            InboundMessage::AuthConfirmed => {
                self.on_authenticated();
                return;
            }
            InboundMessage::Status { rig, status } => (
                rig,
                RigAttribute::Status(status),
                RelayEvent::StatusChanged { rig, status },
            ),
            InboundMessage::Frequency { rig, freq_hz } => (
                rig,
                RigAttribute::Frequency(freq_hz),
                RelayEvent::FrequencyChanged { rig, freq_hz },
            ),
            InboundMessage::Mode { rig, mode } => (
                rig,
                RigAttribute::Mode(mode),
                RelayEvent::ModeChanged { rig, mode },
            ),
            InboundMessage::Ptt { rig, on } => (
                rig,
                RigAttribute::Ptt(on),
                RelayEvent::PttChanged { rig, on },
            ),
            InboundMessage::Unroutable(kind) => {
                trace!(kind = %kind, "dropping update without a valid rig");
                return;
            }
            InboundMessage::Unknown(kind) => {
                trace!(kind = %kind, "ignoring unknown update type");
                return;
            }
        };

        if self.shared.apply(self.session_id, rig, attribute) {
            trace!(?event, "rig update");
            self.shared.emit(event);
        }
    }

    fn on_authenticated(&mut self) {
        if self.authenticated {
            debug!("duplicate auth confirmation ignored");
            return;
        }
        self.authenticated = true;
        self.attempt = 0;
        if self
            .shared
            .set_state(self.session_id, ConnectionState::Authenticated)
        {
            info!(url = %self.config.url, "relay session authenticated");
            self.shared.emit(RelayEvent::Connected);
        }
    }

    /// Drop command frames that never made it onto a transport.
    fn discard_pending_commands(&mut self) {
        let mut dropped = 0usize;
        while self.control_rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!(dropped, "discarded unsent commands");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catweb_core::{ModeFlags, RigStatus};
    use catweb_test_harness::{MockConnector, MockTokenSource};

    fn rig(n: u32) -> RigId {
        RigId::new(n).unwrap()
    }

    fn start(
        shared: &Arc<Shared>,
        connector: MockConnector,
        tokens: MockTokenSource,
    ) -> SessionHandle {
        let session_id = {
            let mut inner = shared.lock();
            inner.session_id += 1;
            inner.state = ConnectionState::Connecting;
            inner.session_id
        };
        spawn_session(
            &tokio::runtime::Handle::current(),
            Arc::clone(shared),
            SessionConfig {
                url: "ws://relay.test:34468".into(),
                reconnect_delay: Duration::from_secs(5),
                connector: Arc::new(connector),
                token_source: Arc::new(tokens),
            },
            session_id,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn handshake_then_updates() {
        let shared = Arc::new(Shared::new(16));
        let mut events = shared.subscribe();
        let (connector, mut relay) = MockConnector::new();
        let handle = start(&shared, connector, MockTokenSource::new());

        let mut conn = relay.accept().await.unwrap();
        assert_eq!(conn.next_sent().await.as_deref(), Some("token:test-token"));

        conn.push(r#"{"auth":true}"#);
        assert_eq!(events.recv().await.unwrap(), RelayEvent::Connected);
        assert_eq!(shared.lock().state, ConnectionState::Authenticated);

        conn.push(r#"{"type":"status","rig":1,"value":"4"}"#);
        conn.push(r#"{"type":"mode","rig":1,"value":"1073741824"}"#);
        assert_eq!(
            events.recv().await.unwrap(),
            RelayEvent::StatusChanged {
                rig: rig(1),
                status: Some(RigStatus::ONLINE)
            }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            RelayEvent::ModeChanged {
                rig: rig(1),
                mode: Some(ModeFlags::FM)
            }
        );
        assert_eq!(shared.lock().cache.mode(rig(1)), Some(ModeFlags::FM));

        handle.cancel.cancel();
        handle.task.await.unwrap();
        assert!(conn.closed_by_client());
    }

    #[tokio::test(start_paused = true)]
    async fn command_frames_are_forwarded() {
        let shared = Arc::new(Shared::new(16));
        let (connector, mut relay) = MockConnector::new();
        let handle = start(&shared, connector, MockTokenSource::new());

        // Queued before the transport is open.
        handle.control_tx.send("2:freq:7074000".into()).unwrap();

        let mut conn = relay.accept().await.unwrap();
        assert_eq!(conn.next_sent().await.as_deref(), Some("token:test-token"));
        assert_eq!(conn.next_sent().await.as_deref(), Some("2:freq:7074000"));

        handle.cancel.cancel();
        handle.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn commands_wait_for_token_frame() {
        let shared = Arc::new(Shared::new(16));
        let tokens = MockTokenSource::new();
        let gate = tokens.respond_gated(200, "\"slow\"");
        let (connector, mut relay) = MockConnector::new();
        let handle = start(&shared, connector, tokens);

        handle.control_tx.send("1:mode:2".into()).unwrap();
        let mut conn = relay.accept().await.unwrap();

        // Token request still outstanding: nothing may reach the relay.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(conn.try_next_sent().is_none());

        gate.send(()).unwrap();
        assert_eq!(conn.next_sent().await.as_deref(), Some("token:slow"));
        assert_eq!(conn.next_sent().await.as_deref(), Some("1:mode:2"));

        handle.cancel.cancel();
        handle.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_token_closes_and_retries() {
        let shared = Arc::new(Shared::new(16));
        let mut events = shared.subscribe();
        let tokens = MockTokenSource::new();
        tokens.respond(403, "\"denied\"");
        let (connector, mut relay) = MockConnector::new();
        let handle = start(&shared, connector, tokens.clone());

        let conn = relay.accept().await.unwrap();
        assert_eq!(events.recv().await.unwrap(), RelayEvent::Disconnected);
        assert!(conn.closed_by_client());
        assert_eq!(shared.lock().state, ConnectionState::Closed);

        assert_eq!(
            events.recv().await.unwrap(),
            RelayEvent::Reconnecting { attempt: 1 }
        );
        let mut second = relay.accept().await.unwrap();
        assert_eq!(second.next_sent().await.as_deref(), Some("token:test-token"));
        assert_eq!(tokens.requests(), 2);

        handle.cancel.cancel();
        handle.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stale_token_is_not_sent() {
        let shared = Arc::new(Shared::new(16));
        let tokens = MockTokenSource::new();
        let gate = tokens.respond_gated(200, "\"late\"");
        let (connector, mut relay) = MockConnector::new();
        let handle = start(&shared, connector, tokens);

        let first = relay.accept().await.unwrap();
        first.close();

        let mut second = relay.accept().await.unwrap();
        assert_eq!(second.next_sent().await.as_deref(), Some("token:test-token"));

        // The first attempt's token arrives after the second attempt began.
        gate.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(second.try_next_sent().is_none());

        handle.cancel.cancel();
        handle.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn retired_session_cannot_write_state() {
        let shared = Arc::new(Shared::new(16));
        let (connector, mut relay) = MockConnector::new();
        let handle = start(&shared, connector, MockTokenSource::new());
        let _conn = relay.accept().await.unwrap();

        let retired = shared.lock().session_id;
        shared.lock().session_id += 1;
        assert!(!shared.set_state(retired, ConnectionState::Authenticated));
        assert!(!shared.apply(retired, rig(1), RigAttribute::Ptt(true)));
        assert!(!shared.lock().cache.ptt(rig(1)));

        handle.cancel.cancel();
        handle.task.await.unwrap();
    }
}
