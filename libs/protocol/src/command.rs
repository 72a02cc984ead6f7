//! Closed command sets for each node role.
//!
//! Parsing validates required fields, so a handler only ever receives a
//! well-formed command.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::envelope::{Envelope, Failure};
use crate::error::CommandError;

/// Protocol version spoken by this implementation.
pub const PROTOCOL_VERSION: i64 = 1;

/// Command names as they appear on the wire.
pub mod names {
    pub const JOIN: &str = "join";
    pub const LEAVE: &str = "leave";
    pub const STATUS: &str = "status";
    pub const SUSPEND: &str = "suspend";
    pub const RESUME: &str = "resume";
    pub const DISCOVER: &str = "discover";
}

/// Parser turning raw frame arguments into a typed command.
pub type Parser<C> = fn(Value) -> Result<C, CommandError>;

// =============================================================================
// Controller-bound commands
// =============================================================================

/// Arguments of any agent-to-controller notification.
///
/// `agent` is guaranteed non-empty. `args` holds the full payload as
/// received (usually an [`Envelope`](crate::Envelope)).
#[derive(Debug, Clone, PartialEq)]
pub struct AgentNotice {
    pub agent: String,
    pub args: Value,
}

impl AgentNotice {
    /// Validate that `args.agent` is a non-empty string.
    pub fn parse(command: &'static str, args: Value) -> Result<Self, CommandError> {
        let agent = args
            .get("agent")
            .and_then(Value::as_str)
            .filter(|a| !a.is_empty())
            .ok_or(CommandError::MissingField {
                command,
                field: "agent",
            })?
            .to_string();
        Ok(Self { agent, args })
    }

    /// Declared protocol version, if any.
    pub fn version(&self) -> Option<i64> {
        self.args.get("version").and_then(Value::as_i64)
    }

    /// The failure reported by an `ERROR` envelope, if any.
    pub fn failure(&self) -> Option<Failure> {
        serde_json::from_value::<Envelope>(self.args.clone())
            .ok()
            .and_then(|env| env.failure_detail())
    }
}

/// Commands handled by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerCommand {
    Join(AgentNotice),
    Leave(AgentNotice),
    Status(AgentNotice),
    Suspend(AgentNotice),
    Resume(AgentNotice),
}

impl ControllerCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ControllerCommand::Join(_) => names::JOIN,
            ControllerCommand::Leave(_) => names::LEAVE,
            ControllerCommand::Status(_) => names::STATUS,
            ControllerCommand::Suspend(_) => names::SUSPEND,
            ControllerCommand::Resume(_) => names::RESUME,
        }
    }

    pub fn notice(&self) -> &AgentNotice {
        match self {
            ControllerCommand::Join(n)
            | ControllerCommand::Leave(n)
            | ControllerCommand::Status(n)
            | ControllerCommand::Suspend(n)
            | ControllerCommand::Resume(n) => n,
        }
    }

    /// Every controller command with its parser.
    pub fn parsers() -> [(&'static str, Parser<Self>); 5] {
        [
            (names::JOIN, |args: Value| {
                AgentNotice::parse(names::JOIN, args).map(Self::Join)
            }),
            (names::LEAVE, |args: Value| {
                AgentNotice::parse(names::LEAVE, args).map(Self::Leave)
            }),
            (names::STATUS, |args: Value| {
                AgentNotice::parse(names::STATUS, args).map(Self::Status)
            }),
            (names::SUSPEND, |args: Value| {
                AgentNotice::parse(names::SUSPEND, args).map(Self::Suspend)
            }),
            (names::RESUME, |args: Value| {
                AgentNotice::parse(names::RESUME, args).map(Self::Resume)
            }),
        ]
    }
}

// =============================================================================
// Agent-bound commands
// =============================================================================

/// `discover` arguments. Both fields are informational.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverArgs {
    pub version: Option<i64>,
    pub realm: Option<String>,
}

/// `status` request from the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRequest {
    pub version: i64,
}

impl Default for StatusRequest {
    fn default() -> Self {
        Self {
            version: PROTOCOL_VERSION,
        }
    }
}

/// `suspend` / `resume` request from the controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateChange {
    pub reason: Option<String>,
}

/// Commands handled by an agent.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentCommand {
    Discover(DiscoverArgs),
    Status(StatusRequest),
    Suspend(StateChange),
    Resume(StateChange),
}

impl AgentCommand {
    pub fn name(&self) -> &'static str {
        match self {
            AgentCommand::Discover(_) => names::DISCOVER,
            AgentCommand::Status(_) => names::STATUS,
            AgentCommand::Suspend(_) => names::SUSPEND,
            AgentCommand::Resume(_) => names::RESUME,
        }
    }

    /// Every agent command with its parser.
    pub fn parsers() -> [(&'static str, Parser<Self>); 4] {
        [
            (names::DISCOVER, |args: Value| {
                lenient_args(names::DISCOVER, args).map(Self::Discover)
            }),
            (names::STATUS, |args: Value| parse_status(args).map(Self::Status)),
            (names::SUSPEND, |args: Value| {
                lenient_args(names::SUSPEND, args).map(Self::Suspend)
            }),
            (names::RESUME, |args: Value| {
                lenient_args(names::RESUME, args).map(Self::Resume)
            }),
        ]
    }
}

/// Deserialize optional-only argument structs; `null` means "no arguments".
fn lenient_args<T>(command: &'static str, args: Value) -> Result<T, CommandError>
where
    T: DeserializeOwned + Default,
{
    if args.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(args).map_err(|e| CommandError::invalid_args(command, e))
}

fn parse_status(args: Value) -> Result<StatusRequest, CommandError> {
    let version = args.get("version").ok_or(CommandError::MissingField {
        command: names::STATUS,
        field: "version",
    })?;
    let version = version.as_i64().ok_or_else(|| CommandError::InvalidArgs {
        command: names::STATUS,
        message: format!("version must be an integer, got {version}"),
    })?;
    Ok(StatusRequest { version })
}
