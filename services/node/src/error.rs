//! Error types for nodes and handlers.

use beacon_bus::TransportError;
use beacon_protocol::FrameError;
use thiserror::Error;

/// Errors returned by public node operations.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Publish/subscribe/close failed. Not recoverable locally; restart the
    /// node.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// An outbound frame could not be encoded.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Outbound arguments could not be serialized.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The node was configured with unusable settings.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl NodeError {
    /// Returns true if the transport has already been closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, NodeError::Transport(e) if e.is_closed())
    }
}

/// Errors raised inside a command handler.
///
/// These are caught at the dispatch boundary and logged; they never stop
/// the receive loop.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Publishing a reply failed.
    #[error("reply failed: {0}")]
    Node(#[from] NodeError),

    /// The handler refused the command.
    #[error("rejected: {0}")]
    Rejected(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
