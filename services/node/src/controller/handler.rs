//! Controller-side command handling.

use async_trait::async_trait;
use beacon_protocol::{AgentNotice, ControllerCommand};
use chrono::Utc;
use tracing::{debug, info, warn};

use super::table::{JoinOutcome, LeaveOutcome, MetaState, StatusOutcome};
use super::SharedTable;
use crate::error::HandlerError;
use crate::node::Handler;

/// Applies agent notifications to the agent table.
pub struct ControllerHandler {
    table: SharedTable,
}

impl ControllerHandler {
    pub fn new(table: SharedTable) -> Self {
        Self { table }
    }

    async fn join(&self, notice: AgentNotice) {
        let outcome = self.table.write().await.join(&notice, Utc::now());
        match outcome {
            JoinOutcome::Joined => {
                info!(agent = %notice.agent, version = ?notice.version(), "Agent joined")
            }
            JoinOutcome::Rejoined => {
                warn!(agent = %notice.agent, "Agent joined again, replacing capabilities")
            }
            JoinOutcome::Returned => info!(agent = %notice.agent, "Departed agent rejoined"),
        }
    }

    async fn leave(&self, notice: AgentNotice) {
        let outcome = self.table.write().await.leave(&notice, Utc::now());
        match outcome {
            LeaveOutcome::Left => info!(agent = %notice.agent, "Agent left"),
            LeaveOutcome::UnknownAgent => warn!(
                agent = %notice.agent,
                "Leave from unknown agent, recorded as departed"
            ),
        }
    }

    async fn status(&self, notice: AgentNotice) {
        let outcome = self.table.write().await.record_status(&notice, Utc::now());
        match outcome {
            StatusOutcome::Updated => debug!(agent = %notice.agent, "Status recorded"),
            StatusOutcome::UnknownAgent => warn!(
                agent = %notice.agent,
                "Status from agent that never joined, record created"
            ),
        }
    }

    /// Apply a confirmed suspend/resume. Failure envelopes and unknown
    /// agents leave the table untouched.
    async fn transition(&self, command: &'static str, notice: AgentNotice, state: MetaState) {
        if let Some(failure) = notice.failure() {
            warn!(
                agent = %notice.agent,
                command,
                kind = %failure.kind,
                detail = %failure.detail,
                "Agent reported failure, state unchanged"
            );
            return;
        }

        if self.table.write().await.set_state(&notice.agent, state) {
            info!(agent = %notice.agent, %state, "Agent state confirmed");
        } else {
            warn!(agent = %notice.agent, command, "Ignoring notification from unknown agent");
        }
    }
}

#[async_trait]
impl Handler for ControllerHandler {
    type Command = ControllerCommand;

    async fn handle(&mut self, command: ControllerCommand) -> Result<(), HandlerError> {
        let name = command.name();
        match command {
            ControllerCommand::Join(notice) => self.join(notice).await,
            ControllerCommand::Leave(notice) => self.leave(notice).await,
            ControllerCommand::Status(notice) => self.status(notice).await,
            ControllerCommand::Suspend(notice) => {
                self.transition(name, notice, MetaState::Suspended).await
            }
            ControllerCommand::Resume(notice) => {
                self.transition(name, notice, MetaState::Resumed).await
            }
        }
        Ok(())
    }
}
