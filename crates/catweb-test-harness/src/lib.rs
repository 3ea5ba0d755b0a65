//! catweb-test-harness: Test utilities and mock transports for catweb.
//!
//! This crate provides [`MockConnector`] / [`MockRelay`] for deterministic
//! testing of the relay session without a network, [`MockTokenSource`] for
//! scripting access-token answers, and [`MockWsServer`] for testing the
//! WebSocket transport against a real loopback server.

pub mod mock_relay;
pub mod mock_token;
pub mod mock_ws;

pub use mock_relay::{MockConnection, MockConnector, MockRelay, MockTransport};
pub use mock_token::{DEFAULT_MOCK_TOKEN, MockTokenSource};
pub use mock_ws::MockWsServer;
