use super::{status_for, NodeContext};
use crate::engine::WorkerNode;
use crate::routing::AgentRole;
use async_trait::async_trait;
use maestro_a2a::{AgentRegistry, AgentSummary};
use maestro_core::{Effort, MaestroError, MaestroResult, RunState, StateUpdate, Task, TaskStore};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

const PLANNER_PROMPT: &str = "\
You are the planner of a software development team. Break the request into \
small, ordered tasks and assign each one to a worker.

Internal workers:
- software_architect: project structure, interfaces, design decisions
- coder: implementation
- tester: tests and validation

Tasks may also be assigned to one of the external agents listed in the \
request, by their exact name.

Respond with a single JSON object:
{\"tasks\": [{\"id\": \"t1\", \"content\": \"...\", \"assigned_to\": \"...\", \
\"requirements\": [], \"dependencies\": [], \"estimated_effort\": \"low|medium|high\"}], \
\"summary\": \"one paragraph plan summary\"}";

#[derive(Debug, Deserialize)]
struct PlanDoc {
    #[serde(default)]
    tasks: Vec<PlannedTask>,
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlannedTask {
    /// Label used by `dependencies`; replaced by a fresh id.
    #[serde(default)]
    id: Option<String>,
    content: String,
    #[serde(default, alias = "assignedTo")]
    assigned_to: String,
    #[serde(default)]
    requirements: Vec<String>,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default, alias = "estimatedEffort")]
    estimated_effort: Option<Effort>,
}

/// Turn the planner's JSON answer into tasks and a plan summary.
///
/// Labels in `dependencies` are rewritten to the generated task ids;
/// unknown labels are kept as they are.
pub fn parse_plan(fence: &Regex, raw: &str) -> MaestroResult<(Vec<Task>, Option<String>)> {
    let body = fence
        .captures(raw)
        .and_then(|c| c.get(1))
        .map_or(raw.trim(), |m| m.as_str());
    let doc: PlanDoc = serde_json::from_str(body)?;

    let labels: HashMap<String, String> = doc
        .tasks
        .iter()
        .filter_map(|t| t.id.clone())
        .map(|label| (label, maestro_core::task::short_id()))
        .collect();

    let tasks = doc
        .tasks
        .into_iter()
        .map(|p| {
            let id = p
                .id
                .as_ref()
                .and_then(|label| labels.get(label).cloned())
                .unwrap_or_else(maestro_core::task::short_id);
            let deps = p
                .dependencies
                .into_iter()
                .map(|d| labels.get(&d).cloned().unwrap_or(d))
                .collect();
            let mut task = Task::with_id(id, p.content, p.assigned_to.trim())
                .with_requirements(p.requirements)
                .with_dependencies(deps);
            task.estimated_effort = p.estimated_effort;
            task
        })
        .collect();
    Ok((tasks, doc.summary))
}

/// Entry node: asks the model for a plan and seeds the task list.
pub struct PlannerNode {
    ctx: Arc<NodeContext>,
    registry: Arc<AgentRegistry>,
    fence: Regex,
}

impl PlannerNode {
    /// Compiles the code fence pattern.
    pub fn new(ctx: Arc<NodeContext>, registry: Arc<AgentRegistry>) -> MaestroResult<Self> {
        let fence = Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```")
            .map_err(|e| MaestroError::Config(e.to_string()))?;
        Ok(Self {
            ctx,
            registry,
            fence,
        })
    }

    fn prompt(request: &str, agents: &[AgentSummary]) -> String {
        let mut prompt = format!("Request:\n{request}\n");
        if !agents.is_empty() {
            prompt.push_str("\nExternal agents:\n");
            for a in agents {
                let description = if a.description.is_empty() {
                    "no description"
                } else {
                    &a.description
                };
                prompt.push_str(&format!(
                    "- {}: {} [{}]\n",
                    a.name,
                    description,
                    a.capabilities.join("; ")
                ));
            }
        }
        prompt
    }
}

#[async_trait]
impl WorkerNode for PlannerNode {
    fn name(&self) -> &str {
        AgentRole::Planner.as_str()
    }

    async fn execute(&self, state: &RunState) -> MaestroResult<StateUpdate> {
        let agents = self.registry.summaries().await;
        info!(external_agents = agents.len(), "Planning request");

        let raw = self
            .ctx
            .complete(PLANNER_PROMPT, Self::prompt(&state.user_request, &agents))
            .await?;

        let (tasks, plan) = match parse_plan(&self.fence, &raw) {
            Ok((tasks, summary)) => (tasks, summary.unwrap_or_else(|| "Plan created".into())),
            Err(e) => {
                warn!(error = %e, "Planner answer is not a JSON plan; keeping it as the plan text");
                (Vec::new(), raw)
            }
        };

        let store = TaskStore::from_tasks(tasks);
        if store.has_cycle() {
            return Err(MaestroError::Workflow(
                "dependency cycle detected in plan".into(),
            ));
        }
        let tasks = store.into_tasks();
        for t in self.ctx.policy.unroutable(&tasks) {
            warn!(task_id = %t.id, assigned_to = %t.assigned_to, "Planned task has no worker");
        }

        let next = self.ctx.policy.next(&tasks, None);
        info!(tasks = tasks.len(), next = %next, "Plan created");
        Ok(StateUpdate::goto(next.as_str())
            .with_status(status_for(&next))
            .with_plan(plan)
            .with_tasks(tasks))
    }
}
