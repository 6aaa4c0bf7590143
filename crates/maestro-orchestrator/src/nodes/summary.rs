use super::{task_lines, worker_outputs, NodeContext};
use crate::engine::WorkerNode;
use crate::routing::AgentRole;
use async_trait::async_trait;
use maestro_core::{MaestroResult, OverallStatus, RunState, StateUpdate, TaskStatus, END};
use std::sync::Arc;
use tracing::{info, warn};

const SUMMARY_PROMPT: &str = "\
You are the orchestrator. Summarise what the team accomplished for the \
request: completed work, test and validation results, open problems and \
recommended next steps.";

/// Final node: writes the run summary and ends the run.
pub struct SummaryNode {
    ctx: Arc<NodeContext>,
}

impl SummaryNode {
    /// Summary node.
    pub fn new(ctx: Arc<NodeContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl WorkerNode for SummaryNode {
    fn name(&self) -> &str {
        AgentRole::Orchestrator.as_str()
    }

    async fn execute(&self, state: &RunState) -> MaestroResult<StateUpdate> {
        let total = state.tasks.len();
        let completed = state
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count();
        let failed = state.failed_task_ids();
        let mut summary = format!(
            "Orchestration complete: {completed}/{total} tasks completed, {} failed",
            failed.len()
        );

        let prompt = format!(
            "Request:\n{}\n\nPlan:\n{}\n\nTasks:\n{}{}",
            state.user_request,
            state.plan.as_deref().unwrap_or("none"),
            task_lines(&state.tasks),
            worker_outputs(state)
        );
        match self.ctx.complete(SUMMARY_PROMPT, prompt).await {
            Ok(text) if !text.trim().is_empty() => {
                summary.push_str("\n\n");
                summary.push_str(text.trim());
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Model summary unavailable"),
        }

        let update = StateUpdate::goto(END).with_summary(summary);
        if failed.is_empty() {
            info!(completed, total, "Run completed");
            Ok(update.with_status(OverallStatus::Completed))
        } else {
            warn!(failed = ?failed, "Run finished with failed tasks");
            Ok(update
                .with_status(OverallStatus::Failed)
                .with_error(format!("failed tasks: {}", failed.join(", "))))
        }
    }
}
