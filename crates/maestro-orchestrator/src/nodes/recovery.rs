use super::{task_lines, NodeContext};
use crate::engine::WorkerNode;
use crate::routing::AgentRole;
use async_trait::async_trait;
use maestro_core::{MaestroResult, RunState, StateUpdate};
use std::sync::Arc;
use tracing::{info, warn};

const RECOVERY_PROMPT: &str = "\
You are the error recovery specialist. Given the failure below and the task \
list, explain the most likely root cause and what the team should do next. \
Be brief.";

/// Receives control after a failure: records an analysis of `state.error`,
/// clears it and routes back into the pipeline.
///
/// Failed tasks are no longer outstanding, so routing moves past them.
pub struct RecoveryNode {
    ctx: Arc<NodeContext>,
}

impl RecoveryNode {
    /// Recovery node.
    pub fn new(ctx: Arc<NodeContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl WorkerNode for RecoveryNode {
    fn name(&self) -> &str {
        AgentRole::ErrorRecovery.as_str()
    }

    async fn execute(&self, state: &RunState) -> MaestroResult<StateUpdate> {
        let next = self.ctx.policy.next(&state.tasks, None);
        let Some(error) = state.error.as_deref().filter(|e| !e.is_empty()) else {
            info!(next = %next, "No error recorded; continuing");
            return Ok(StateUpdate::goto(next));
        };

        info!(pass = state.iteration_count, error = %error, "Recovering from failure");
        let prompt = format!(
            "Request:\n{}\n\nFailure:\n{error}\n\nTasks:\n{}",
            state.user_request,
            task_lines(&state.tasks)
        );
        let analysis = match self.ctx.complete(RECOVERY_PROMPT, prompt).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => error.to_string(),
            Err(e) => {
                warn!(error = %e, "Recovery analysis unavailable");
                error.to_string()
            }
        };

        Ok(StateUpdate::goto(next)
            .clear_error()
            .with_result(self.name(), analysis))
    }
}
