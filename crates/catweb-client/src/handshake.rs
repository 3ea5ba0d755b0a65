//! Access-token handshake.
//!
//! After every transport open the session fetches a fresh token from the
//! token endpoint and forwards it over the relay connection as a
//! `token:<value>` frame. The fetch runs in its own task and reports back
//! through a channel, tagged with the generation of the connection attempt
//! that started it. The session discards results whose generation is no
//! longer current.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use catweb_core::{Error, Result, TokenResponse, TokenSource};

use crate::codec;

/// HTTP status accepted as a successful token answer.
const STATUS_OK: u16 = 200;

/// Result of one token fetch, delivered back to the session.
#[derive(Debug)]
pub(crate) struct TokenOutcome {
    /// Connection attempt that requested the token.
    pub generation: u64,
    /// The ready-to-send token frame, or why none could be produced.
    pub result: Result<String>,
}

/// Fetch a token in the background and send the outcome to `tx`.
///
/// The fetch is not cancelled by a disconnect; a late outcome lands in a
/// channel nobody reads or is discarded as stale.
pub(crate) fn spawn_token_fetch(
    source: Arc<dyn TokenSource>,
    generation: u64,
    tx: mpsc::UnboundedSender<TokenOutcome>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(generation, "requesting access token");
        let result = match source.request_token().await {
            Ok(response) => token_frame(&response),
            Err(e) => Err(e),
        };
        if tx.send(TokenOutcome { generation, result }).is_err() {
            trace!(generation, "session gone before token arrived");
        }
    })
}

/// Turn a token endpoint answer into the frame sent to the relay.
///
/// Any status other than 200 is [`Error::AccessDenied`].
pub fn token_frame(response: &TokenResponse) -> Result<String> {
    if response.status != STATUS_OK {
        return Err(Error::AccessDenied(response.status));
    }
    let token = decode_token_body(&response.body)?;
    Ok(codec::encode_token(&token))
}

/// Decode the JSON-encoded token from a response body.
///
/// A JSON string yields its contents; a number or boolean yields its JSON
/// text. Anything else is a protocol error.
pub fn decode_token_body(body: &str) -> Result<String> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| Error::Protocol(format!("token body is not JSON: {e}")))?;
    match value {
        Value::String(token) => Ok(token),
        Value::Number(_) | Value::Bool(_) => Ok(value.to_string()),
        other => Err(Error::Protocol(format!(
            "unexpected token body: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catweb_test_harness::MockTokenSource;

    #[test]
    fn ok_response_becomes_token_frame() {
        let frame = token_frame(&TokenResponse::new(200, "\"abc123\"")).unwrap();
        assert_eq!(frame, "token:abc123");
    }

    #[test]
    fn non_200_is_access_denied() {
        assert!(matches!(
            token_frame(&TokenResponse::new(403, "\"nope\"")),
            Err(Error::AccessDenied(403))
        ));
        assert!(matches!(
            token_frame(&TokenResponse::new(500, "")),
            Err(Error::AccessDenied(500))
        ));
    }

    #[test]
    fn token_body_variants() {
        assert_eq!(decode_token_body(" \"k\" ").unwrap(), "k");
        assert_eq!(decode_token_body("12345").unwrap(), "12345");
        assert!(matches!(decode_token_body("{}"), Err(Error::Protocol(_))));
        assert!(matches!(decode_token_body("null"), Err(Error::Protocol(_))));
        assert!(matches!(decode_token_body("raw"), Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn fetch_reports_generation() {
        let source = MockTokenSource::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        spawn_token_fetch(Arc::new(source.clone()), 7, tx)
            .await
            .unwrap();

        let outcome = rx.recv().await.unwrap();
        assert_eq!(outcome.generation, 7);
        assert_eq!(outcome.result.unwrap(), "token:test-token");
        assert_eq!(source.requests(), 1);
    }

    #[tokio::test]
    async fn fetch_failure_is_reported() {
        let source = MockTokenSource::new();
        source.fail("offline");
        let (tx, mut rx) = mpsc::unbounded_channel();

        spawn_token_fetch(Arc::new(source), 1, tx).await.unwrap();

        let outcome = rx.recv().await.unwrap();
        assert!(matches!(outcome.result, Err(Error::Transport(_))));
    }
}
