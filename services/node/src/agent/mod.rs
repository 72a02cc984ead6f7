//! Agent node.
//!
//! An agent listens on its own unicast channel and on the broadcast
//! channel, answers controller requests through [`AgentHandler`], and runs
//! a work loop ([`Agent::work`]) that reports its status every tick.

mod context;
mod handler;
mod state;

pub use handler::AgentHandler;
pub use state::LocalState;

use std::sync::Arc;
use std::time::Duration;

use beacon_bus::Transport;
use beacon_protocol::{AgentCommand, ChannelPrefixes, Channels, Failure, Realm};
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, info_span, warn, Instrument};

use self::context::AgentContext;
use crate::config::{Config, DEFAULT_TICK_INTERVAL_SECS};
use crate::error::NodeError;
use crate::node::{Node, Publisher, Registry, StatsSnapshot};

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Unique agent name within the realm.
    pub name: String,
    pub realm: Realm,
    pub prefixes: ChannelPrefixes,
    /// Period of the work loop.
    pub tick_interval: Duration,
}

impl AgentConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            realm: Realm::default(),
            prefixes: ChannelPrefixes::default(),
            tick_interval: Duration::from_secs(DEFAULT_TICK_INTERVAL_SECS),
        }
    }

    pub fn from_config(name: impl Into<String>, config: &Config) -> Self {
        Self {
            name: name.into(),
            realm: config.realm.clone(),
            prefixes: config.prefixes.clone(),
            tick_interval: config.tick_interval(),
        }
    }
}

/// An agent: one node on its own channel and the broadcast channel.
pub struct Agent {
    node: Node,
    ctx: AgentContext,
    channels: Channels,
    tick_interval: Duration,
}

impl Agent {
    /// Subscribe to the agent's channels and start answering requests.
    ///
    /// Starting does not join; call [`join`](Self::join) or wait for the
    /// controller's `discover`.
    pub async fn start(
        transport: Arc<dyn Transport>,
        config: AgentConfig,
    ) -> Result<Self, NodeError> {
        if config.name.is_empty() {
            return Err(NodeError::InvalidConfig("agent name must not be empty".to_string()));
        }
        if config.tick_interval.is_zero() {
            return Err(NodeError::InvalidConfig(
                "tick interval must be greater than zero".to_string(),
            ));
        }

        let channels = Channels::new(config.realm, &config.prefixes);
        let ctx = AgentContext::new(
            config.name,
            channels.control().to_string(),
            Publisher::new(Arc::clone(&transport)),
        );

        let registry = Registry::builder("agent")
            .register_all(AgentCommand::parsers())
            .build();

        let span = info_span!("agent", agent = %ctx.name(), realm = %channels.realm());
        let node = Node::start(
            transport,
            vec![
                channels.agent(ctx.name()),
                channels.broadcast().to_string(),
            ],
            registry,
            AgentHandler::new(ctx.clone()),
            span,
        )
        .await?;

        Ok(Self {
            node,
            ctx,
            channels,
            tick_interval: config.tick_interval,
        })
    }

    pub fn name(&self) -> &str {
        self.ctx.name()
    }

    pub async fn state(&self) -> LocalState {
        self.ctx.state().await
    }

    /// Announce this agent to the controller.
    pub async fn join(&self) -> Result<(), NodeError> {
        self.ctx.join().instrument(self.node.span().clone()).await
    }

    pub async fn leave(&self) -> Result<(), NodeError> {
        self.ctx.leave().instrument(self.node.span().clone()).await
    }

    /// Send `command` to the controller. `Err` is reported as a failure
    /// envelope.
    pub async fn notify(
        &self,
        command: &str,
        outcome: Result<Option<Value>, Failure>,
    ) -> Result<(), NodeError> {
        self.ctx.notify(command, outcome).await
    }

    pub async fn notify_ok(&self, command: &str, data: Value) -> Result<(), NodeError> {
        self.notify(command, Ok(Some(data))).await
    }

    /// Run one work-loop tick: report current status to the controller.
    pub async fn report(&self) -> Result<(), NodeError> {
        self.ctx
            .report_status()
            .instrument(self.node.span().clone())
            .await
    }

    /// Report status every tick interval until the agent is closed.
    ///
    /// Reporting continues while the agent is suspended.
    pub async fn work(&self) -> Result<(), NodeError> {
        let mut shutdown = self.node.shutdown_signal();
        if *shutdown.borrow() {
            return Ok(());
        }

        info!(
            parent: self.node.span(),
            tick_interval_ms = self.tick_interval.as_millis() as u64,
            "Work loop starting"
        );

        let result = self
            .work_until(&mut shutdown)
            .instrument(self.node.span().clone())
            .await;
        match result {
            Err(e) if e.is_closed() && self.node.is_closed() => Ok(()),
            Err(e) => {
                warn!(parent: self.node.span(), error = %e, "Work loop failed");
                Err(e)
            }
            Ok(()) => {
                info!(parent: self.node.span(), "Work loop stopped");
                Ok(())
            }
        }
    }

    async fn work_until(&self, shutdown: &mut watch::Receiver<bool>) -> Result<(), NodeError> {
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
                    self.ctx.report_status().await?;
                }
            }
        }
    }

    pub fn channels(&self) -> &Channels {
        &self.channels
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.node.stats()
    }

    /// Stop the receive loop and the work loop and release the transport.
    ///
    /// Does not send `leave`.
    pub async fn close(&self) -> Result<(), NodeError> {
        self.node.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_bus::MemoryBroker;

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let broker = MemoryBroker::new();
        let result = Agent::start(Arc::new(broker.connect()), AgentConfig::new("")).await;
        assert!(matches!(result, Err(NodeError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_zero_tick_rejected() {
        let broker = MemoryBroker::new();
        let config = AgentConfig {
            tick_interval: Duration::ZERO,
            ..AgentConfig::new("w1")
        };
        let result = Agent::start(Arc::new(broker.connect()), config).await;
        assert!(matches!(result, Err(NodeError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_channels() {
        let broker = MemoryBroker::new();
        let config = AgentConfig {
            realm: Realm::new("lab"),
            ..AgentConfig::new("w1")
        };
        let agent = Agent::start(Arc::new(broker.connect()), config).await.unwrap();

        assert_eq!(agent.name(), "w1");
        assert_eq!(agent.state().await, LocalState::Unset);
        assert_eq!(agent.channels().agent("w1"), "mnrdmqagnt:lab.w1");
        assert_eq!(broker.subscriber_count("mnrdmqagnt:lab.w1").await, 1);
        assert_eq!(broker.subscriber_count("mnrdmqbcst:lab").await, 1);

        agent.close().await.unwrap();
        assert_eq!(broker.subscriber_count("mnrdmqagnt:lab.w1").await, 0);
    }

    #[test]
    fn test_config_from_env_config() {
        let config = Config {
            realm: Realm::new("lab"),
            tick_interval_secs: 4,
            ..Config::default()
        };
        let agent = AgentConfig::from_config("w9", &config);
        assert_eq!(agent.name, "w9");
        assert_eq!(agent.realm.as_str(), "lab");
        assert_eq!(agent.tick_interval, Duration::from_secs(4));
    }
}
