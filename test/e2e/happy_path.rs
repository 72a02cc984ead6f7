//! End-to-end happy path test.
//!
//! A controller and real agents share one memory broker. The tests
//! validate the full signalling flow:
//!
//! 1. Controller broadcasts `discover`
//! 2. Agents join
//! 3. Serve ticks unicast `status` and agents answer
//! 4. Suspend/resume probes reach agents and come back confirmed
//! 5. Agents leave and are kept as departed records
//!
//! ## Running
//!
//! ```bash
//! cargo test -p beacon-e2e --test happy_path
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use beacon_bus::MemoryBroker;
use beacon_node::{
    Agent, AgentConfig, AgentRecord, Controller, ControllerConfig, LocalState, MetaState,
    ProbeStrategy,
};
use beacon_protocol::Realm;
use serde_json::json;
use tokio::task::JoinHandle;

const TICK: Duration = Duration::from_millis(100);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,beacon_node=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

async fn start_controller(
    broker: &MemoryBroker,
    realm: &str,
    strategy: ProbeStrategy,
) -> Arc<Controller> {
    let config = ControllerConfig {
        realm: Realm::new(realm),
        tick_interval: TICK,
        probe_strategy: strategy,
        ..ControllerConfig::default()
    };
    Arc::new(
        Controller::start(Arc::new(broker.connect()), config)
            .await
            .expect("failed to start controller"),
    )
}

async fn start_agent(broker: &MemoryBroker, realm: &str, name: &str) -> Arc<Agent> {
    let config = AgentConfig {
        realm: Realm::new(realm),
        tick_interval: TICK,
        ..AgentConfig::new(name)
    };
    Arc::new(
        Agent::start(Arc::new(broker.connect()), config)
            .await
            .expect("failed to start agent"),
    )
}

fn spawn_serve(controller: &Arc<Controller>) -> JoinHandle<()> {
    let controller = Arc::clone(controller);
    tokio::spawn(async move {
        controller.serve().await.expect("serve loop failed");
    })
}

/// Poll `check` until it returns `Some`, failing after five seconds.
async fn wait_until<T, F, Fut>(what: &str, mut check: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let max_wait = Duration::from_secs(5);
    let start = std::time::Instant::now();

    loop {
        if let Some(value) = check().await {
            return value;
        }
        if start.elapsed() > max_wait {
            panic!("{what} did not happen within {max_wait:?}");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

async fn record_matching<P>(controller: &Controller, agent: &str, pred: P) -> Option<AgentRecord>
where
    P: Fn(&AgentRecord) -> bool,
{
    controller.agent(agent).await.filter(|r| pred(r))
}

/// Discover, join, status probe and status reply, as seen from the
/// controller's agent table.
#[tokio::test]
async fn e2e_discover_join_status() {
    init_tracing();

    let broker = MemoryBroker::new();
    let controller = start_controller(&broker, "lab", ProbeStrategy::StatusOnly).await;
    let agent = start_agent(&broker, "lab", "w1").await;

    let serve = spawn_serve(&controller);

    let joined = wait_until("w1 join", || {
        record_matching(&controller, "w1", |r| r.joined_at.is_some())
    })
    .await;
    assert_eq!(joined.capability_version(), Some(1));
    assert_eq!(joined.meta.state, MetaState::Unset);

    let reported = wait_until("w1 status report", || {
        record_matching(&controller, "w1", |r| r.status.is_some())
    })
    .await;
    let status = reported.status.expect("status recorded");
    assert_eq!(status["agent"], "w1");
    assert_eq!(status["result"], "OK");
    assert_eq!(
        status["data"],
        json!({"status": "OK", "agent": "w1", "state": null})
    );
    assert!(reported.last_seen_at.is_some());
    assert_eq!(agent.state().await, LocalState::Unset);

    agent.close().await.unwrap();
    controller.close().await.unwrap();
    serve.await.unwrap();
}

/// The oscillating probe drives the agent through suspend and resume, and
/// the controller records each confirmation.
#[tokio::test]
async fn e2e_suspend_resume_probes() {
    init_tracing();

    let broker = MemoryBroker::new();
    let controller = start_controller(&broker, "lab", ProbeStrategy::Oscillate).await;
    let agent = start_agent(&broker, "lab", "w1").await;
    agent.join().await.unwrap();

    let serve = spawn_serve(&controller);

    wait_until("w1 suspended", || {
        record_matching(&controller, "w1", |r| r.meta.state == MetaState::Suspended)
    })
    .await;
    wait_until("w1 resumed", || {
        record_matching(&controller, "w1", |r| r.meta.state == MetaState::Resumed)
    })
    .await;

    let state = agent.state().await;
    assert!(matches!(state, LocalState::Suspended | LocalState::Resumed));

    agent.close().await.unwrap();
    controller.close().await.unwrap();
    serve.await.unwrap();
}

/// Agents that leave stay in the table as departed; the rest stay active.
#[tokio::test]
async fn e2e_leave_keeps_departed_record() {
    init_tracing();

    let broker = MemoryBroker::new();
    let controller = start_controller(&broker, "lab", ProbeStrategy::StatusOnly).await;
    let w1 = start_agent(&broker, "lab", "w1").await;
    let w2 = start_agent(&broker, "lab", "w2").await;

    let serve = spawn_serve(&controller);
    let work = {
        let w2 = Arc::clone(&w2);
        tokio::spawn(async move { w2.work().await })
    };

    for name in ["w1", "w2"] {
        wait_until("join", || {
            record_matching(&controller, name, |r| r.joined_at.is_some())
        })
        .await;
    }

    w1.leave().await.unwrap();
    w1.close().await.unwrap();

    let departed = wait_until("w1 departure", || {
        record_matching(&controller, "w1", AgentRecord::has_left)
    })
    .await;
    assert!(departed.joined_at.is_some());

    let agents = controller.agents().await;
    assert_eq!(agents.len(), 2);
    assert!(!agents["w2"].has_left());

    w2.close().await.unwrap();
    work.await.unwrap().unwrap();
    controller.close().await.unwrap();
    serve.await.unwrap();
}

/// Realms sharing one broker never see each other.
#[tokio::test]
async fn e2e_realms_are_isolated() {
    init_tracing();

    let broker = MemoryBroker::new();
    let controller = start_controller(&broker, "red", ProbeStrategy::Oscillate).await;
    let agent = start_agent(&broker, "blue", "w1").await;

    let serve = spawn_serve(&controller);
    agent.join().await.unwrap();
    tokio::time::sleep(TICK * 3).await;

    assert!(controller.agents().await.is_empty());
    assert_eq!(agent.state().await, LocalState::Unset);
    assert_eq!(agent.stats().received, 0);

    agent.close().await.unwrap();
    controller.close().await.unwrap();
    serve.await.unwrap();
}
