//! CatWebBuilder -- fluent builder for constructing [`CatWebClient`] instances.
//!
//! Separates configuration from construction so that callers can set up the
//! relay endpoint, token endpoint, and reconnect behavior before the session
//! starts. Test doubles for the connector and token source plug in here.
//!
//! # Example
//!
//! ```no_run
//! use catweb_client::builder::CatWebBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> catweb_core::Result<()> {
//! let client = CatWebBuilder::new()
//!     .reconnect_delay(Duration::from_secs(2))
//!     .build()?;
//! client.connect()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use catweb_core::error::{Error, Result};
use catweb_core::transport::{Connector, TokenSource};
use catweb_transport::{HttpTokenSource, WsConnector};

use crate::client::{CatWebClient, ClientOptions};

/// Fluent builder for [`CatWebClient`].
///
/// All configuration has defaults matching the public relay service, so the
/// simplest usage is:
///
/// ```ignore
/// let client = CatWebBuilder::new().build()?;
/// ```
#[derive(Default)]
pub struct CatWebBuilder {
    options: ClientOptions,
    connector: Option<Arc<dyn Connector>>,
    token_source: Option<Arc<dyn TokenSource>>,
}

impl CatWebBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing options.
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the relay host (default: `cat4web.localhost.r8acc.ru`).
    pub fn host(mut self, host: &str) -> Self {
        self.options.host = host.to_string();
        self
    }

    /// Choose `wss://` (true, the default) or `ws://`.
    pub fn secure(mut self, secure: bool) -> Self {
        self.options.secure = secure;
        self
    }

    /// Set the `ws://` port (default: 34468).
    pub fn plain_port(mut self, port: u16) -> Self {
        self.options.plain_port = port;
        self
    }

    /// Set the `wss://` port (default: 34469).
    pub fn secure_port(mut self, port: u16) -> Self {
        self.options.secure_port = port;
        self
    }

    /// Set the access-token endpoint.
    pub fn token_url(mut self, url: &str) -> Self {
        self.options.token_url = url.to_string();
        self
    }

    /// Set the wait before reconnecting after an unexpected close
    /// (default: 5000ms).
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.options.reconnect_delay = delay;
        self
    }

    /// Set the [`RelayEvent`](catweb_core::RelayEvent) broadcast capacity.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.options.event_capacity = capacity;
        self
    }

    /// Use a custom connector instead of the WebSocket one.
    pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Use a custom token source instead of the HTTP one.
    pub fn token_source(mut self, source: impl TokenSource + 'static) -> Self {
        self.token_source = Some(Arc::new(source));
        self
    }

    /// Build the client. The session is not started until
    /// [`CatWebClient::connect`].
    pub fn build(self) -> Result<CatWebClient> {
        if self.options.host.is_empty() {
            return Err(Error::InvalidParameter("relay host must not be empty".into()));
        }
        if self.options.reconnect_delay.is_zero() {
            return Err(Error::InvalidParameter(
                "reconnect delay must be greater than zero".into(),
            ));
        }

        let connector = match self.connector {
            Some(connector) => connector,
            None => Arc::new(WsConnector::new()),
        };
        let token_source = match self.token_source {
            Some(source) => source,
            None => Arc::new(HttpTokenSource::new(&self.options.token_url)?),
        };

        Ok(CatWebClient::new(self.options, connector, token_source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catweb_test_harness::{MockConnector, MockTokenSource};

    #[test]
    fn builder_defaults() {
        let client = CatWebBuilder::new().build().unwrap();
        let opts = client.options();
        assert_eq!(opts.relay_url(), "wss://cat4web.localhost.r8acc.ru:34469");
        assert_eq!(opts.reconnect_delay, Duration::from_millis(5000));
    }

    #[test]
    fn builder_overrides() {
        let (connector, _relay) = MockConnector::new();
        let client = CatWebBuilder::new()
            .host("127.0.0.1")
            .secure(false)
            .plain_port(9001)
            .reconnect_delay(Duration::from_millis(250))
            .event_capacity(8)
            .connector(connector)
            .token_source(MockTokenSource::new())
            .build()
            .unwrap();
        let opts = client.options();
        assert_eq!(opts.relay_url(), "ws://127.0.0.1:9001");
        assert_eq!(opts.reconnect_delay, Duration::from_millis(250));
        assert_eq!(opts.event_capacity, 8);
    }

    #[test]
    fn builder_rejects_empty_host() {
        let result = CatWebBuilder::new().host("").build();
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn builder_rejects_zero_delay() {
        let result = CatWebBuilder::new()
            .reconnect_delay(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }
}
