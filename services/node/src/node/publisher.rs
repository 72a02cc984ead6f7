//! Outbound frame publishing.

use std::sync::Arc;

use beacon_bus::Transport;
use beacon_protocol::frame;
use serde::Serialize;
use tracing::debug;

use crate::error::NodeError;

/// Cheap, cloneable handle for publishing frames over a node's transport.
#[derive(Clone)]
pub struct Publisher {
    transport: Arc<dyn Transport>,
}

impl Publisher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Encode `command:args` and publish it on `channel`.
    ///
    /// Fire-and-forget: success means the transport accepted the frame, not
    /// that anyone received it.
    pub async fn send<T>(&self, channel: &str, command: &str, args: &T) -> Result<(), NodeError>
    where
        T: Serialize + ?Sized + Sync,
    {
        let payload = serde_json::to_value(args)?;
        let bytes = frame::encode(command, &payload)?;
        self.transport.publish(channel, bytes).await?;
        debug!(channel, command, "Published frame");
        Ok(())
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher").finish_non_exhaustive()
    }
}
