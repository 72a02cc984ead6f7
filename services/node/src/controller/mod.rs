//! Controller node.
//!
//! The controller listens on the control channel for agent notifications,
//! keeps the [`AgentTable`] and runs the periodic reconciliation loop
//! ([`Controller::serve`]) that probes every known agent.
//!
//! The table is shared between the receive loop and the serve loop behind a
//! `tokio::sync::RwLock`. Each tick computes its probe plan under the lock
//! and publishes after releasing it.

mod handler;
mod probe;
mod table;

pub use handler::ControllerHandler;
pub use probe::{plan_probes, Probe, ProbeStrategy};
pub use table::{
    AgentMeta, AgentRecord, AgentTable, JoinOutcome, LeaveOutcome, MetaState, StatusOutcome,
};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use beacon_bus::Transport;
use beacon_protocol::{
    names, ChannelPrefixes, Channels, ControllerCommand, DiscoverArgs, Realm, StateChange,
    StatusRequest, PROTOCOL_VERSION,
};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::{Config, DEFAULT_TICK_INTERVAL_SECS};
use crate::error::NodeError;
use crate::node::{Node, Registry, StatsSnapshot};

/// Agent table shared by the receive loop and the serve loop.
pub type SharedTable = Arc<RwLock<AgentTable>>;

/// Reason attached to suspend/resume requests sent by the serve loop.
const PROBE_REASON: &str = "liveness probe";

/// Controller configuration.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub realm: Realm,
    pub prefixes: ChannelPrefixes,
    /// Period of the serve loop.
    pub tick_interval: Duration,
    pub probe_strategy: ProbeStrategy,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            realm: Realm::default(),
            prefixes: ChannelPrefixes::default(),
            tick_interval: Duration::from_secs(DEFAULT_TICK_INTERVAL_SECS),
            probe_strategy: ProbeStrategy::default(),
        }
    }
}

impl ControllerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            realm: config.realm.clone(),
            prefixes: config.prefixes.clone(),
            tick_interval: config.tick_interval(),
            probe_strategy: config.probe_strategy,
        }
    }
}

/// The controller: one node on the control channel plus the agent table.
pub struct Controller {
    node: Node,
    channels: Channels,
    table: SharedTable,
    tick_interval: Duration,
    probe_strategy: ProbeStrategy,
}

impl Controller {
    /// Subscribe to the control channel and start handling notifications.
    pub async fn start(
        transport: Arc<dyn Transport>,
        config: ControllerConfig,
    ) -> Result<Self, NodeError> {
        if config.tick_interval.is_zero() {
            return Err(NodeError::InvalidConfig(
                "tick interval must be greater than zero".to_string(),
            ));
        }

        let channels = Channels::new(config.realm, &config.prefixes);
        let table: SharedTable = Arc::new(RwLock::new(AgentTable::new()));

        let registry = Registry::builder("controller")
            .register_all(ControllerCommand::parsers())
            .build();

        let span = info_span!("controller", realm = %channels.realm());
        let node = Node::start(
            transport,
            vec![channels.control().to_string()],
            registry,
            ControllerHandler::new(Arc::clone(&table)),
            span,
        )
        .await?;

        Ok(Self {
            node,
            channels,
            table,
            tick_interval: config.tick_interval,
            probe_strategy: config.probe_strategy,
        })
    }

    // =========================================================================
    // Outbound
    // =========================================================================

    /// Publish `command` to every agent.
    pub async fn broadcast<T>(&self, command: &str, args: &T) -> Result<(), NodeError>
    where
        T: Serialize + ?Sized + Sync,
    {
        self.node
            .publisher()
            .send(self.channels.broadcast(), command, args)
            .await
    }

    /// Publish `command` to one agent's channel.
    pub async fn unicast<T>(&self, agent: &str, command: &str, args: &T) -> Result<(), NodeError>
    where
        T: Serialize + ?Sized + Sync,
    {
        self.node
            .publisher()
            .send(&self.channels.agent(agent), command, args)
            .await
    }

    /// Request a status report from `agent`, or from every agent.
    pub async fn status(&self, agent: Option<&str>) -> Result<(), NodeError> {
        let request = StatusRequest::default();
        match agent {
            Some(agent) => self.unicast(agent, names::STATUS, &request).await,
            None => self.broadcast(names::STATUS, &request).await,
        }
    }

    pub async fn suspend(&self, agent: &str, reason: Option<&str>) -> Result<(), NodeError> {
        let args = StateChange {
            reason: reason.map(str::to_string),
        };
        self.unicast(agent, names::SUSPEND, &args).await
    }

    pub async fn resume(&self, agent: &str, reason: Option<&str>) -> Result<(), NodeError> {
        let args = StateChange {
            reason: reason.map(str::to_string),
        };
        self.unicast(agent, names::RESUME, &args).await
    }

    /// Ask every listening agent to join.
    pub async fn discover(&self) -> Result<(), NodeError> {
        let args = DiscoverArgs {
            version: Some(PROTOCOL_VERSION),
            realm: Some(self.channels.realm().to_string()),
        };
        self.broadcast(names::DISCOVER, &args).await
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    /// Run one reconciliation pass: probe every active agent, then broadcast
    /// a general status request.
    pub async fn tick(&self) -> Result<(), NodeError> {
        let probes = {
            let table = self.table.read().await;
            plan_probes(&table, self.probe_strategy)
        };

        debug!(parent: self.node.span(), probes = probes.len(), "Reconciliation tick");

        for probe in &probes {
            match probe {
                Probe::Status(agent) => self.status(Some(agent.as_str())).await?,
                Probe::Suspend(agent) => self.suspend(agent, Some(PROBE_REASON)).await?,
                Probe::Resume(agent) => self.resume(agent, Some(PROBE_REASON)).await?,
            }
        }

        self.status(None).await
    }

    /// Broadcast `discover`, then run [`tick`](Self::tick) every tick
    /// interval until the controller is closed.
    ///
    /// Returns `Ok(())` once closed. A transport failure ends the loop with
    /// the error; restarting is left to the caller.
    pub async fn serve(&self) -> Result<(), NodeError> {
        let mut shutdown = self.node.shutdown_signal();
        if *shutdown.borrow() {
            return Ok(());
        }

        info!(
            parent: self.node.span(),
            tick_interval_ms = self.tick_interval.as_millis() as u64,
            strategy = %self.probe_strategy,
            "Serve loop starting"
        );

        let result = self
            .serve_until(&mut shutdown)
            .instrument(self.node.span().clone())
            .await;
        match result {
            Err(e) if e.is_closed() && self.node.is_closed() => Ok(()),
            Err(e) => {
                warn!(parent: self.node.span(), error = %e, "Serve loop failed");
                Err(e)
            }
            Ok(()) => {
                info!(parent: self.node.span(), "Serve loop stopped");
                Ok(())
            }
        }
    }

    async fn serve_until(
        &self,
        shutdown: &mut tokio::sync::watch::Receiver<bool>,
    ) -> Result<(), NodeError> {
        self.discover().await?;

        let mut interval = interval_at(Instant::now() + self.tick_interval, self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return Ok(());
                    }
                }
                _ = interval.tick() => {
                    self.tick().await?;
                }
            }
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// A copy of one agent's record.
    pub async fn agent(&self, name: &str) -> Option<AgentRecord> {
        self.table.read().await.get(name).cloned()
    }

    /// A copy of every record, departed agents included.
    pub async fn agents(&self) -> BTreeMap<String, AgentRecord> {
        self.table.read().await.snapshot()
    }

    pub fn channels(&self) -> &Channels {
        &self.channels
    }

    pub fn probe_strategy(&self) -> ProbeStrategy {
        self.probe_strategy
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.node.stats()
    }

    /// Stop the receive loop and the serve loop and release the transport.
    pub async fn close(&self) -> Result<(), NodeError> {
        self.node.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_bus::MemoryBroker;

    #[tokio::test]
    async fn test_zero_tick_interval_rejected() {
        let broker = MemoryBroker::new();
        let config = ControllerConfig {
            tick_interval: Duration::ZERO,
            ..ControllerConfig::default()
        };

        let result = Controller::start(Arc::new(broker.connect()), config).await;
        assert!(matches!(result, Err(NodeError::InvalidConfig(_))));
    }

    #[test]
    fn test_config_from_env_config() {
        let config = Config {
            realm: Realm::new("lab"),
            tick_interval_secs: 2,
            probe_strategy: ProbeStrategy::StatusOnly,
            ..Config::default()
        };

        let controller = ControllerConfig::from_config(&config);
        assert_eq!(controller.realm.as_str(), "lab");
        assert_eq!(controller.tick_interval, Duration::from_secs(2));
        assert_eq!(controller.probe_strategy, ProbeStrategy::StatusOnly);
    }
}
