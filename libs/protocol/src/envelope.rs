//! Envelope - the wrapper for every agent-to-controller notification.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::command::PROTOCOL_VERSION;

/// Outcome reported by an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ResultCode {
    #[default]
    #[serde(rename = "OK")]
    Ok,
    /// `EX` is what older agents send for failures.
    #[serde(rename = "ERROR", alias = "EX")]
    Error,
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultCode::Ok => write!(f, "OK"),
            ResultCode::Error => write!(f, "ERROR"),
        }
    }
}

/// Description of a failure carried in `Envelope::data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Short error class, e.g. the Rust type name of the error.
    pub kind: String,
    /// Human readable detail.
    pub detail: String,
}

impl Failure {
    pub fn new(kind: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            detail: detail.into(),
        }
    }

    /// Describe an error value. `kind` is the last path segment of the
    /// error's type name.
    pub fn from_error<E: std::error::Error + ?Sized>(err: &E) -> Self {
        let type_name = std::any::type_name::<E>();
        let kind = type_name
            .split('<')
            .next()
            .and_then(|path| path.rsplit("::").next())
            .unwrap_or(type_name);
        Self::new(kind, err.to_string())
    }
}

/// Agent-to-controller notification body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub agent: String,
    pub version: i64,
    #[serde(default)]
    pub result: ResultCode,
    #[serde(default)]
    pub data: Option<Value>,
}

impl Envelope {
    /// Successful notification with optional data.
    pub fn ok(agent: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            agent: agent.into(),
            version: PROTOCOL_VERSION,
            result: ResultCode::Ok,
            data,
        }
    }

    /// Failed notification; `data` carries the failure description.
    pub fn failure(agent: impl Into<String>, failure: Failure) -> Self {
        Self {
            agent: agent.into(),
            version: PROTOCOL_VERSION,
            result: ResultCode::Error,
            data: Some(serde_json::json!({
                "kind": failure.kind,
                "detail": failure.detail,
            })),
        }
    }

    /// Build from an outcome: `Ok` maps to `OK`, `Err` to `ERROR`.
    pub fn from_outcome(agent: impl Into<String>, outcome: Result<Option<Value>, Failure>) -> Self {
        match outcome {
            Ok(data) => Self::ok(agent, data),
            Err(failure) => Self::failure(agent, failure),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.result == ResultCode::Error
    }

    /// The failure description, if this envelope reports one. A failure
    /// whose data does not have the `{kind, detail}` shape is reported
    /// with kind `unknown`.
    pub fn failure_detail(&self) -> Option<Failure> {
        if !self.is_failure() {
            return None;
        }
        let data = self.data.clone().unwrap_or(Value::Null);
        Some(
            serde_json::from_value(data.clone())
                .unwrap_or_else(|_| Failure::new("unknown", data.to_string())),
        )
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "agent": self.agent,
            "version": self.version,
            "result": self.result,
            "data": self.data,
        })
    }
}
