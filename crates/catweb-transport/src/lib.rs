//! Transport implementations for catweb.
//!
//! This crate provides the production implementations of the traits in
//! `catweb-core`:
//!
//! - [`WsTransport`] / [`WsConnector`]: the persistent WebSocket to the relay
//!   (`ws://` or `wss://`)
//! - [`HttpTokenSource`]: the access-token request to the licence service
//!
//! # Example
//!
//! ```no_run
//! use catweb_core::transport::{Connector, TokenSource};
//! use catweb_transport::{DEFAULT_TOKEN_URL, HttpTokenSource, WsConnector};
//!
//! # async fn example() -> catweb_core::Result<()> {
//! let token = HttpTokenSource::new(DEFAULT_TOKEN_URL)?.request_token().await?;
//! let mut transport = WsConnector::new()
//!     .connect("wss://cat4web.localhost.r8acc.ru:34469")
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod token;
pub mod ws;

pub use token::{DEFAULT_TOKEN_URL, HttpTokenSource};
pub use ws::{WsConnector, WsTransport};
