//! Scripted access-token source.
//!
//! [`MockTokenSource`] implements [`TokenSource`] with a queue of scripted
//! answers. When the queue is empty it falls back to a default answer
//! (`200` with a JSON-encoded token). An answer can be held back until the
//! test releases it, which is how stale handshake completions are
//! reproduced.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::oneshot;

use catweb_core::error::{Error, Result};
use catweb_core::transport::{TokenResponse, TokenSource};

/// Default token body handed out when nothing is scripted.
pub const DEFAULT_MOCK_TOKEN: &str = "test-token";

enum Scripted {
    Ready(Result<TokenResponse>),
    Gated(oneshot::Receiver<()>, Result<TokenResponse>),
}

/// A [`TokenSource`] returning scripted answers.
#[derive(Clone)]
pub struct MockTokenSource {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    fallback: TokenResponse,
    requests: Arc<AtomicUsize>,
}

impl MockTokenSource {
    /// Create a source that answers `200 "test-token"` unless scripted.
    pub fn new() -> Self {
        Self::with_fallback(TokenResponse::new(
            200,
            format!("\"{DEFAULT_MOCK_TOKEN}\""),
        ))
    }

    /// Create a source with a custom fallback answer.
    pub fn with_fallback(fallback: TokenResponse) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            fallback,
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue an answer for the next request.
    pub fn respond(&self, status: u16, body: &str) {
        lock(&self.script).push_back(Scripted::Ready(Ok(TokenResponse::new(status, body))));
    }

    /// Queue a transport failure for the next request.
    pub fn fail(&self, reason: &str) {
        lock(&self.script).push_back(Scripted::Ready(Err(Error::Transport(reason.to_string()))));
    }

    /// Queue an answer that is only delivered once the returned sender fires
    /// (or is dropped).
    pub fn respond_gated(&self, status: u16, body: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        lock(&self.script).push_back(Scripted::Gated(rx, Ok(TokenResponse::new(status, body))));
        tx
    }

    /// Number of token requests received so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Default for MockTokenSource {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTokenSource")
            .field("queued", &lock(&self.script).len())
            .field("requests", &self.requests())
            .finish()
    }
}

#[async_trait]
impl TokenSource for MockTokenSource {
    async fn request_token(&self) -> Result<TokenResponse> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let next = lock(&self.script).pop_front();
        match next {
            None => Ok(self.fallback.clone()),
            Some(Scripted::Ready(result)) => result,
            Some(Scripted::Gated(gate, result)) => {
                let _ = gate.await;
                result
            }
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fallback_answer() {
        let source = MockTokenSource::new();
        let response = source.request_token().await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "\"test-token\"");
        assert_eq!(source.requests(), 1);
    }

    #[tokio::test]
    async fn scripted_answers_in_order() {
        let source = MockTokenSource::new();
        source.respond(403, "\"no\"");
        source.fail("offline");

        assert_eq!(source.request_token().await.unwrap().status, 403);
        assert!(source.request_token().await.is_err());
        assert_eq!(source.request_token().await.unwrap().status, 200);
    }

    #[tokio::test]
    async fn gated_answer_waits_for_release() {
        let source = MockTokenSource::new();
        let gate = source.respond_gated(200, "\"late\"");

        let pending = {
            let source = source.clone();
            tokio::spawn(async move { source.request_token().await })
        };
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        gate.send(()).unwrap();
        let response = pending.await.unwrap().unwrap();
        assert_eq!(response.body, "\"late\"");
    }
}
