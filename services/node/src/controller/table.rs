//! Agent table - the controller's view of every agent it has heard from.
//!
//! Records are keyed by agent name and never removed: `leave` marks a record
//! as departed (`left_at`) rather than deleting it, and a later `join`
//! revives it.

use std::collections::BTreeMap;

use beacon_protocol::AgentNotice;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Suspend/resume state last confirmed by an agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaState {
    #[default]
    Unset,
    Suspended,
    Resumed,
}

impl std::fmt::Display for MetaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetaState::Unset => write!(f, "unset"),
            MetaState::Suspended => write!(f, "suspended"),
            MetaState::Resumed => write!(f, "resumed"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgentMeta {
    pub state: MetaState,
}

/// One agent as seen by the controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgentRecord {
    /// Payload of the last `join`.
    pub capabilities: Option<Value>,
    pub joined_at: Option<DateTime<Utc>>,
    pub left_at: Option<DateTime<Utc>>,
    pub last_seen_at: Option<DateTime<Utc>>,
    /// Payload of the last `status` report.
    pub status: Option<Value>,
    pub meta: AgentMeta,
}

impl AgentRecord {
    pub fn has_left(&self) -> bool {
        self.left_at.is_some()
    }

    /// Protocol version declared at join time.
    pub fn capability_version(&self) -> Option<i64> {
        self.capabilities
            .as_ref()
            .and_then(|caps| caps.get("version"))
            .and_then(Value::as_i64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// First time this name was seen.
    Joined,
    /// The agent was already joined; capabilities were replaced.
    Rejoined,
    /// The agent had left and came back.
    Returned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    Left,
    /// Never seen before; a departed record was created.
    UnknownAgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutcome {
    Updated,
    /// Never seen before; a record was created from the report.
    UnknownAgent,
}

/// Controller-owned agent records, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct AgentTable {
    agents: BTreeMap<String, AgentRecord>,
}

impl AgentTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&mut self, notice: &AgentNotice, now: DateTime<Utc>) -> JoinOutcome {
        let (record, outcome) = match self.agents.get_mut(&notice.agent) {
            Some(record) if record.has_left() => (record, JoinOutcome::Returned),
            Some(record) => (record, JoinOutcome::Rejoined),
            None => (
                self.agents.entry(notice.agent.clone()).or_default(),
                JoinOutcome::Joined,
            ),
        };

        record.capabilities = Some(notice.args.clone());
        record.joined_at = Some(now);
        record.left_at = None;
        outcome
    }

    pub fn leave(&mut self, notice: &AgentNotice, now: DateTime<Utc>) -> LeaveOutcome {
        match self.agents.get_mut(&notice.agent) {
            Some(record) => {
                record.left_at = Some(now);
                LeaveOutcome::Left
            }
            None => {
                self.agents.insert(
                    notice.agent.clone(),
                    AgentRecord {
                        left_at: Some(now),
                        ..AgentRecord::default()
                    },
                );
                LeaveOutcome::UnknownAgent
            }
        }
    }

    pub fn record_status(&mut self, notice: &AgentNotice, now: DateTime<Utc>) -> StatusOutcome {
        let outcome = if self.agents.contains_key(&notice.agent) {
            StatusOutcome::Updated
        } else {
            StatusOutcome::UnknownAgent
        };

        let record = self.agents.entry(notice.agent.clone()).or_default();
        record.last_seen_at = Some(now);
        record.status = Some(notice.args.clone());
        outcome
    }

    /// Set the confirmed state of a known agent. Returns false, changing
    /// nothing, if the agent is unknown.
    pub fn set_state(&mut self, agent: &str, state: MetaState) -> bool {
        match self.agents.get_mut(agent) {
            Some(record) => {
                record.meta.state = state;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, agent: &str) -> Option<&AgentRecord> {
        self.agents.get(agent)
    }

    pub fn contains(&self, agent: &str) -> bool {
        self.agents.contains_key(agent)
    }

    /// All records, departed ones included, in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AgentRecord)> {
        self.agents.iter().map(|(name, record)| (name.as_str(), record))
    }

    /// Records of agents that have not left.
    pub fn active(&self) -> impl Iterator<Item = (&str, &AgentRecord)> {
        self.iter().filter(|(_, record)| !record.has_left())
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn snapshot(&self) -> BTreeMap<String, AgentRecord> {
        self.agents.clone()
    }
}
