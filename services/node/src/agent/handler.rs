//! Agent-side command handling.

use async_trait::async_trait;
use beacon_protocol::{names, AgentCommand, PROTOCOL_VERSION};
use tracing::{debug, info};

use super::context::AgentContext;
use super::state::LocalState;
use crate::error::HandlerError;
use crate::node::Handler;

/// Answers controller requests on behalf of one agent.
pub struct AgentHandler {
    ctx: AgentContext,
}

impl AgentHandler {
    pub(crate) fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Handler for AgentHandler {
    type Command = AgentCommand;

    async fn handle(&mut self, command: AgentCommand) -> Result<(), HandlerError> {
        match command {
            AgentCommand::Discover(args) => {
                debug!(realm = ?args.realm, version = ?args.version, "Discovered, joining");
                self.ctx.join().await?;
            }
            AgentCommand::Status(request) if request.version == PROTOCOL_VERSION => {
                self.ctx.report_status().await?;
            }
            AgentCommand::Status(request) => {
                debug!(version = request.version, "Ignoring status request for other version");
            }
            AgentCommand::Suspend(change) => {
                info!(reason = ?change.reason, "Suspending");
                self.ctx
                    .transition(names::SUSPEND, LocalState::Suspended)
                    .await?;
            }
            AgentCommand::Resume(change) => {
                info!(reason = ?change.reason, "Resuming");
                self.ctx
                    .transition(names::RESUME, LocalState::Resumed)
                    .await?;
            }
        }
        Ok(())
    }
}
