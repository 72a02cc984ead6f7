//! Node runtime: transport binding, receive loop and teardown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use beacon_bus::{InboundMessage, Subscription, Transport};
use beacon_protocol::frame;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn, Instrument, Span};

use super::publisher::Publisher;
use super::registry::{Handler, Registry};
use super::stats::{NodeStats, StatsSnapshot};
use crate::error::NodeError;

/// A running node: one subscription, one receive loop, one shutdown signal.
///
/// The receive loop handles one frame at a time. Periodic loops owned by the
/// controller or agent watch [`Node::shutdown_signal`] and stop when the
/// node is closed.
pub struct Node {
    transport: Arc<dyn Transport>,
    publisher: Publisher,
    shutdown_tx: watch::Sender<bool>,
    receive_task: Mutex<Option<JoinHandle<()>>>,
    stats: Arc<NodeStats>,
    span: Span,
    closed: AtomicBool,
}

impl Node {
    /// Subscribe to `channels` and start the receive loop.
    pub async fn start<H>(
        transport: Arc<dyn Transport>,
        channels: Vec<String>,
        registry: Registry<H::Command>,
        handler: H,
        span: Span,
    ) -> Result<Self, NodeError>
    where
        H: Handler,
    {
        let subscription = transport.subscribe(&channels).await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = Arc::new(NodeStats::default());

        let task = tokio::spawn(
            run_receive_loop(subscription, registry, handler, shutdown_rx, Arc::clone(&stats))
                .instrument(span.clone()),
        );

        span.in_scope(|| info!(?channels, "Node started"));

        Ok(Self {
            publisher: Publisher::new(Arc::clone(&transport)),
            transport,
            shutdown_tx,
            receive_task: Mutex::new(Some(task)),
            stats,
            span,
            closed: AtomicBool::new(false),
        })
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// Receiver that flips to `true` when the node is closed.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop the receive loop, wake any periodic loop and release the
    /// transport. Calling it again does nothing.
    pub async fn close(&self) -> Result<(), NodeError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let _ = self.shutdown_tx.send(true);

        let task = self
            .receive_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                self.span
                    .in_scope(|| warn!(error = %e, "Receive loop did not exit cleanly"));
            }
        }

        self.transport.close().await?;

        self.span.in_scope(|| {
            info!(
                messages_received = self.stats.snapshot().received,
                "Node closed"
            )
        });
        Ok(())
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        // Without close() the loop would outlive its owner.
        if !self.is_closed() {
            let _ = self.shutdown_tx.send(true);
        }
    }
}

/// Run the receive loop until shutdown or until the subscription ends.
async fn run_receive_loop<H: Handler>(
    mut subscription: Subscription,
    registry: Registry<H::Command>,
    mut handler: H,
    mut shutdown: watch::Receiver<bool>,
    stats: Arc<NodeStats>,
) {
    debug!(
        role = registry.role(),
        commands = ?registry.commands(),
        "Receive loop started"
    );

    loop {
        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    debug!("Receive loop received shutdown signal");
                    break;
                }
            }

            msg = subscription.next() => {
                match msg {
                    Some(msg) => {
                        stats.record_received();
                        process_message(msg, &registry, &mut handler, &stats).await;
                    }
                    None => {
                        warn!("Subscription ended, stopping receive loop");
                        break;
                    }
                }
            }
        }
    }

    debug!(
        messages_received = stats.snapshot().received,
        "Receive loop stopped"
    );
}

async fn process_message<H: Handler>(
    msg: InboundMessage,
    registry: &Registry<H::Command>,
    handler: &mut H,
    stats: &NodeStats,
) {
    let frame = match frame::decode(&msg.payload) {
        Ok(frame) => frame,
        Err(e) => {
            stats.record_malformed();
            warn!(
                channel = %msg.channel,
                error = %e,
                payload = %String::from_utf8_lossy(&msg.payload),
                "Dropping undecodable frame"
            );
            return;
        }
    };

    let outcome = registry.dispatch(frame, handler).await;
    stats.record(outcome);
}
