//! Transport error types.

use thiserror::Error;

/// Errors raised by a transport. None of these are recoverable locally.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The connection has been closed.
    #[error("transport closed")]
    Closed,

    /// Publishing to a channel failed.
    #[error("publish to {channel} failed: {message}")]
    Publish { channel: String, message: String },

    /// Subscribing failed.
    #[error("subscribe failed: {0}")]
    Subscribe(String),

    /// Connection-level failure.
    #[error("connection error: {0}")]
    Connection(String),
}

impl TransportError {
    pub fn is_closed(&self) -> bool {
        matches!(self, TransportError::Closed)
    }
}
