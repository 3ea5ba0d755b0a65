//! Error types for catweb.
//!
//! All fallible operations across the workspace return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport failures, protocol decode
//! errors, and handshake rejections are all captured here.

/// The error type for all catweb operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (WebSocket connect, send, or receive failure).
    #[error("transport error: {0}")]
    Transport(String),

    /// A protocol-level error (malformed JSON frame, unexpected token body).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The access-token request was answered with a non-200 status.
    ///
    /// The relay will not accept the session without a token, so the
    /// connection attempt is abandoned and left to the reconnect timer.
    #[error("access token request rejected with HTTP status {0}")]
    AccessDenied(u16),

    /// Timed out waiting for the relay.
    #[error("timeout waiting for relay")]
    Timeout,

    /// No session is connecting or authenticated.
    #[error("not connected")]
    NotConnected,

    /// A session is already running (connecting, authenticated, or waiting
    /// to reconnect).
    #[error("already connected")]
    AlreadyConnected,

    /// The connection to the relay was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// The operation is not available in this environment.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// An invalid parameter was passed to a client operation.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
