//! beacon-sim
//!
//! Runs one controller and a handful of agents in-process over a memory
//! broker, so the whole discover/join/status/suspend/resume exchange can be
//! watched in the logs.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use beacon_bus::MemoryBroker;
use beacon_node::{Agent, AgentConfig, Config, Controller, ControllerConfig, ProbeStrategy};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Simulate a controller and its agents on an in-process broker.
#[derive(Debug, Parser)]
#[command(name = "beacon-sim", version, about)]
struct Args {
    /// Number of agents to start.
    #[arg(short, long, env = "BEACON_SIM_AGENTS", default_value_t = 3)]
    agents: usize,

    /// Stop after this many seconds instead of waiting for Ctrl-C.
    #[arg(short, long, env = "BEACON_SIM_DURATION_SECS")]
    duration: Option<u64>,

    /// Override the serve/work tick interval in seconds.
    #[arg(long)]
    tick: Option<u64>,

    /// Override the controller's probe strategy (oscillate, status-only).
    #[arg(long)]
    strategy: Option<ProbeStrategy>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(tick) = args.tick {
        anyhow::ensure!(tick > 0, "--tick must be greater than zero");
        config.tick_interval_secs = tick;
    }
    if let Some(strategy) = args.strategy {
        config.probe_strategy = strategy;
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!(
        realm = %config.realm,
        agents = args.agents,
        tick_interval_secs = config.tick_interval_secs,
        strategy = %config.probe_strategy,
        "Starting beacon simulation"
    );

    let broker = MemoryBroker::new();

    let controller = Arc::new(
        Controller::start(
            Arc::new(broker.connect()),
            ControllerConfig::from_config(&config),
        )
        .await
        .context("failed to start controller")?,
    );

    let mut agents = Vec::with_capacity(args.agents);
    for i in 0..args.agents {
        let name = format!("agent-{i}");
        let agent = Agent::start(
            Arc::new(broker.connect()),
            AgentConfig::from_config(name.as_str(), &config),
        )
        .await
        .with_context(|| format!("failed to start {name}"))?;
        agent.join().await?;
        agents.push(Arc::new(agent));
    }

    let serve_handle = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.serve().await }
    });

    let work_handles: Vec<_> = agents
        .iter()
        .map(|agent| {
            let agent = Arc::clone(agent);
            tokio::spawn(async move { agent.work().await })
        })
        .collect();

    let deadline = async {
        match args.duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received shutdown signal"),
        _ = deadline => info!("Simulation time elapsed"),
    }

    for agent in &agents {
        if let Err(e) = agent.leave().await {
            warn!(agent = agent.name(), error = %e, "Failed to leave");
        }
        agent.close().await?;
    }

    // Let the controller record the leaves before it stops receiving.
    tokio::time::sleep(Duration::from_millis(200)).await;
    controller.close().await?;

    for handle in work_handles {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Work loop error"),
            Err(e) => error!(error = %e, "Work task panicked"),
        }
    }
    match serve_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "Serve loop error"),
        Err(e) => error!(error = %e, "Serve task panicked"),
    }

    let table = controller.agents().await;
    info!(
        known_agents = table.len(),
        departed = table.values().filter(|r| r.has_left()).count(),
        stats = ?controller.stats(),
        "Simulation complete"
    );
    Ok(())
}
