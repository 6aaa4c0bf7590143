//! The worker nodes of the standard workflow.

mod pipeline;
mod planner;
mod recovery;
mod remote;
mod summary;

pub use pipeline::PipelineWorker;
pub use planner::{parse_plan, PlannerNode};
pub use recovery::RecoveryNode;
pub use remote::RemoteDispatchNode;
pub use summary::SummaryNode;

use crate::llm::{ChatMessage, Generation, TextGenerator};
use crate::routing::{AgentRole, RoutingPolicy};
use crate::runner::DEFAULT_MAX_TURNS;
use crate::tools::ToolRegistry;
use maestro_core::{MaestroResult, OverallStatus, RunState, Task};
use std::sync::Arc;

/// What the model-backed nodes share.
pub struct NodeContext {
    /// Model used by every node.
    pub generator: Arc<dyn TextGenerator>,
    /// Routing rules.
    pub policy: RoutingPolicy,
    /// Tools offered to pipeline workers on top of the task tools.
    pub tools: ToolRegistry,
    /// Model turns per execution.
    pub max_turns: u32,
}

impl NodeContext {
    /// Context with default routing and tools.
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            policy: RoutingPolicy::default(),
            tools: ToolRegistry::new(),
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    /// Single-shot completion without tools.
    pub(crate) async fn complete(&self, system_prompt: &str, prompt: String) -> MaestroResult<String> {
        let generation = self
            .generator
            .generate(Some(system_prompt), &[ChatMessage::user(prompt)], &[])
            .await?;
        Ok(match generation {
            Generation::Text(text) => text,
            Generation::ToolUse { content, .. } => content.unwrap_or_default(),
        })
    }
}

/// Run status shown while `worker` is active.
pub(crate) fn status_for(worker: &str) -> OverallStatus {
    match worker {
        w if w == AgentRole::SoftwareArchitect.as_str() => OverallStatus::Architecting,
        w if w == AgentRole::Tester.as_str() => OverallStatus::Testing,
        w if w == AgentRole::Planner.as_str() => OverallStatus::Planning,
        _ => OverallStatus::Implementing,
    }
}

/// One line per task, for prompts.
pub(crate) fn task_lines(tasks: &[Task]) -> String {
    tasks
        .iter()
        .map(|t| {
            let owner = if t.assigned_to.is_empty() {
                "unassigned"
            } else {
                &t.assigned_to
            };
            format!("- [{}] {} ({}) -> {owner}\n", t.id, t.content, t.status)
        })
        .collect()
}

/// Earlier worker outputs, sorted by worker name.
pub(crate) fn worker_outputs(state: &RunState) -> String {
    let mut results: Vec<_> = state.implementation_results.iter().collect();
    results.sort_by(|a, b| a.0.cmp(b.0));
    results
        .into_iter()
        .map(|(worker, text)| format!("\nOutput of {worker}:\n{text}\n"))
        .collect()
}
