//! Transport contract.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use futures_core::Stream;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// A message received on a subscribed channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub channel: String,
    pub payload: Bytes,
}

/// Publish/subscribe transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Publish `payload` on `channel`. Succeeds even if nobody is listening.
    async fn publish(&self, channel: &str, payload: Bytes) -> Result<(), TransportError>;

    /// Subscribe to a set of channels.
    async fn subscribe(&self, channels: &[String]) -> Result<Subscription, TransportError>;

    /// Close the connection. Subscriptions created through it end.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Stream of inbound messages for a set of channels.
///
/// The stream ends when the underlying connection is closed. Dropping the
/// subscription stops delivery.
#[derive(Debug)]
pub struct Subscription {
    channels: Vec<String>,
    rx: mpsc::UnboundedReceiver<InboundMessage>,
}

impl Subscription {
    /// Wrap a receiver fed by a transport implementation.
    pub fn new(channels: Vec<String>, rx: mpsc::UnboundedReceiver<InboundMessage>) -> Self {
        Self { channels, rx }
    }

    /// Channels this subscription covers.
    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// Wait for the next message. Returns `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<InboundMessage> {
        self.rx.recv().await
    }
}

impl Stream for Subscription {
    type Item = InboundMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
