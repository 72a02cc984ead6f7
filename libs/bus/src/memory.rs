//! In-process broker.
//!
//! One [`MemoryBroker`] plays the role of the pub/sub server; every node
//! holds its own [`MemoryConnection`]. Messages published on a channel are
//! delivered to each live subscription on that channel in publish order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, trace};

use crate::error::TransportError;
use crate::transport::{InboundMessage, Subscription, Transport};

#[derive(Debug)]
struct Subscriber {
    connection_id: u64,
    tx: mpsc::UnboundedSender<InboundMessage>,
}

#[derive(Debug, Default)]
struct BrokerState {
    /// Subscribers by channel name.
    channels: HashMap<String, Vec<Subscriber>>,

    /// Total messages accepted for publishing.
    published: u64,
}

/// In-process pub/sub broker.
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    next_connection_id: Arc<AtomicU64>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new connection to this broker.
    pub fn connect(&self) -> MemoryConnection {
        let id = self.next_connection_id.fetch_add(1, Ordering::SeqCst);
        debug!(connection_id = id, "Memory broker connection opened");
        MemoryConnection {
            id,
            broker: self.clone(),
            closed: AtomicBool::new(false),
        }
    }

    /// Number of live subscriptions on `channel`.
    pub async fn subscriber_count(&self, channel: &str) -> usize {
        let state = self.state.lock().await;
        state
            .channels
            .get(channel)
            .map(|subs| subs.iter().filter(|s| !s.tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Total messages published through this broker.
    pub async fn published_count(&self) -> u64 {
        self.state.lock().await.published
    }

    async fn deliver(&self, channel: &str, payload: Bytes) -> usize {
        let mut state = self.state.lock().await;
        state.published += 1;

        let Some(subscribers) = state.channels.get_mut(channel) else {
            return 0;
        };

        subscribers.retain(|sub| {
            sub.tx
                .send(InboundMessage {
                    channel: channel.to_string(),
                    payload: payload.clone(),
                })
                .is_ok()
        });
        let delivered = subscribers.len();

        if subscribers.is_empty() {
            state.channels.remove(channel);
        }

        delivered
    }

    async fn add_subscription(
        &self,
        connection_id: u64,
        channels: &[String],
    ) -> mpsc::UnboundedReceiver<InboundMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock().await;
        for channel in channels {
            state
                .channels
                .entry(channel.clone())
                .or_default()
                .push(Subscriber {
                    connection_id,
                    tx: tx.clone(),
                });
        }
        rx
    }

    async fn drop_connection(&self, connection_id: u64) {
        let mut state = self.state.lock().await;
        for subscribers in state.channels.values_mut() {
            subscribers.retain(|s| s.connection_id != connection_id);
        }
        state.channels.retain(|_, subs| !subs.is_empty());
    }
}

/// A single node's connection to a [`MemoryBroker`].
#[derive(Debug)]
pub struct MemoryConnection {
    id: u64,
    broker: MemoryBroker,
    closed: AtomicBool,
}

impl MemoryConnection {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.is_closed() {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Transport for MemoryConnection {
    async fn publish(&self, channel: &str, payload: Bytes) -> Result<(), TransportError> {
        self.ensure_open()?;
        let delivered = self.broker.deliver(channel, payload).await;
        trace!(connection_id = self.id, channel, delivered, "Published");
        Ok(())
    }

    async fn subscribe(&self, channels: &[String]) -> Result<Subscription, TransportError> {
        self.ensure_open()?;
        if channels.is_empty() {
            return Err(TransportError::Subscribe("no channels given".to_string()));
        }

        let rx = self.broker.add_subscription(self.id, channels).await;
        debug!(connection_id = self.id, ?channels, "Subscribed");
        Ok(Subscription::new(channels.to_vec(), rx))
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.broker.drop_connection(self.id).await;
        debug!(connection_id = self.id, "Memory broker connection closed");
        Ok(())
    }
}
