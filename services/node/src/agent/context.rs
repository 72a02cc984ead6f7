//! State and outbound operations shared by an agent and its handler.

use std::sync::Arc;

use beacon_protocol::{names, Envelope, Failure};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::debug;

use super::state::LocalState;
use crate::error::NodeError;
use crate::node::Publisher;

#[derive(Debug, Clone)]
pub(crate) struct AgentContext {
    name: String,
    control: String,
    publisher: Publisher,
    state: Arc<RwLock<LocalState>>,
}

impl AgentContext {
    pub(crate) fn new(name: String, control: String, publisher: Publisher) -> Self {
        Self {
            name,
            control,
            publisher,
            state: Arc::new(RwLock::new(LocalState::default())),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) async fn state(&self) -> LocalState {
        *self.state.read().await
    }

    pub(crate) async fn set_state(&self, state: LocalState) {
        *self.state.write().await = state;
    }

    /// Publish an envelope-wrapped `command` to the controller.
    pub(crate) async fn notify(
        &self,
        command: &str,
        outcome: Result<Option<Value>, Failure>,
    ) -> Result<(), NodeError> {
        let envelope = Envelope::from_outcome(self.name.as_str(), outcome);
        self.publisher.send(&self.control, command, &envelope).await
    }

    pub(crate) async fn join(&self) -> Result<(), NodeError> {
        self.notify(names::JOIN, Ok(None)).await
    }

    pub(crate) async fn leave(&self) -> Result<(), NodeError> {
        self.notify(names::LEAVE, Ok(None)).await
    }

    /// Send `{status: "OK", agent, state}` to the controller.
    pub(crate) async fn report_status(&self) -> Result<(), NodeError> {
        let state = self.state().await;
        let report = json!({
            "status": "OK",
            "agent": self.name,
            "state": state,
        });
        debug!(%state, "Reporting status");
        self.notify(names::STATUS, Ok(Some(report))).await
    }

    /// Change local state and confirm it to the controller with `command`.
    pub(crate) async fn transition(
        &self,
        command: &'static str,
        state: LocalState,
    ) -> Result<(), NodeError> {
        self.set_state(state).await;
        let ack = json!({"status": "OK", "agent": self.name});
        self.notify(command, Ok(Some(ack))).await
    }
}
