//! Per-tick probe planning.
//!
//! `plan_probes` reads the agent table and decides which unicast requests a
//! reconciliation tick sends. Planning is pure so the table lock is only
//! held while the plan is computed, never while publishing.

use std::fmt;
use std::str::FromStr;

use beacon_protocol::PROTOCOL_VERSION;

use super::table::{AgentTable, MetaState};

/// How the controller exercises agents on each tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProbeStrategy {
    /// Status request plus a suspend/resume toggle every tick.
    ///
    /// This is a liveness stub, not a scheduling policy: a suspended agent
    /// is told to resume and a resumed one to suspend, whether or not that
    /// is wanted. It stays the default for compatibility with existing
    /// deployments.
    #[default]
    Oscillate,
    /// Status requests only; agent state is left alone.
    StatusOnly,
}

impl FromStr for ProbeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "oscillate" => Ok(ProbeStrategy::Oscillate),
            "status-only" | "status_only" => Ok(ProbeStrategy::StatusOnly),
            other => Err(format!(
                "unknown probe strategy '{other}', expected 'oscillate' or 'status-only'"
            )),
        }
    }
}

impl fmt::Display for ProbeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStrategy::Oscillate => write!(f, "oscillate"),
            ProbeStrategy::StatusOnly => write!(f, "status-only"),
        }
    }
}

/// One unicast request planned for an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    Status(String),
    Suspend(String),
    Resume(String),
}

impl Probe {
    pub fn agent(&self) -> &str {
        match self {
            Probe::Status(agent) | Probe::Suspend(agent) | Probe::Resume(agent) => agent,
        }
    }
}

/// Plan the unicast probes for one tick, in agent name order.
///
/// Departed agents are skipped. A status request is only sent to agents
/// that joined declaring the current protocol version.
pub fn plan_probes(table: &AgentTable, strategy: ProbeStrategy) -> Vec<Probe> {
    let mut probes = Vec::new();

    for (name, record) in table.active() {
        if record.capability_version() == Some(PROTOCOL_VERSION) {
            probes.push(Probe::Status(name.to_string()));
        }

        if strategy == ProbeStrategy::Oscillate {
            probes.push(match record.meta.state {
                MetaState::Suspended => Probe::Resume(name.to_string()),
                MetaState::Resumed | MetaState::Unset => Probe::Suspend(name.to_string()),
            });
        }
    }

    probes
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_protocol::AgentNotice;
    use chrono::Utc;
    use rstest::rstest;
    use serde_json::json;

    fn join(table: &mut AgentTable, agent: &str, version: i64) {
        let notice = AgentNotice {
            agent: agent.to_string(),
            args: json!({"agent": agent, "version": version}),
        };
        table.join(&notice, Utc::now());
    }

    #[rstest]
    #[case("oscillate", ProbeStrategy::Oscillate)]
    #[case("status-only", ProbeStrategy::StatusOnly)]
    #[case("status_only", ProbeStrategy::StatusOnly)]
    #[case(" Status-Only ", ProbeStrategy::StatusOnly)]
    fn test_parse_strategy(#[case] input: &str, #[case] expected: ProbeStrategy) {
        assert_eq!(input.parse::<ProbeStrategy>().unwrap(), expected);
    }

    #[test]
    fn test_parse_strategy_rejects_unknown() {
        assert!("aggressive".parse::<ProbeStrategy>().is_err());
    }

    #[test]
    fn test_strategy_display_round_trips() {
        for strategy in [ProbeStrategy::Oscillate, ProbeStrategy::StatusOnly] {
            assert_eq!(strategy.to_string().parse::<ProbeStrategy>().unwrap(), strategy);
        }
    }

    #[test]
    fn test_oscillate_plan() {
        let mut table = AgentTable::new();
        join(&mut table, "a", 1);
        join(&mut table, "b", 1);
        join(&mut table, "c", 1);
        table.set_state("b", MetaState::Suspended);
        table.set_state("c", MetaState::Resumed);

        let plan = plan_probes(&table, ProbeStrategy::Oscillate);
        assert_eq!(
            plan,
            vec![
                Probe::Status("a".into()),
                Probe::Suspend("a".into()),
                Probe::Status("b".into()),
                Probe::Resume("b".into()),
                Probe::Status("c".into()),
                Probe::Suspend("c".into()),
            ]
        );
    }

    #[test]
    fn test_status_only_plan() {
        let mut table = AgentTable::new();
        join(&mut table, "a", 1);
        table.set_state("a", MetaState::Suspended);

        assert_eq!(
            plan_probes(&table, ProbeStrategy::StatusOnly),
            vec![Probe::Status("a".into())]
        );
    }

    #[test]
    fn test_other_versions_get_no_status_request() {
        let mut table = AgentTable::new();
        join(&mut table, "old", 2);

        let plan = plan_probes(&table, ProbeStrategy::Oscillate);
        assert_eq!(plan, vec![Probe::Suspend("old".into())]);
        assert!(plan_probes(&table, ProbeStrategy::StatusOnly).is_empty());
    }

    #[test]
    fn test_departed_agents_are_skipped() {
        let mut table = AgentTable::new();
        join(&mut table, "a", 1);
        let leave = AgentNotice {
            agent: "a".to_string(),
            args: json!({"agent": "a"}),
        };
        table.leave(&leave, Utc::now());

        assert!(plan_probes(&table, ProbeStrategy::Oscillate).is_empty());
    }

    #[test]
    fn test_probe_agent() {
        assert_eq!(Probe::Resume("w1".into()).agent(), "w1");
    }
}
