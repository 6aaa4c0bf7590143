use super::{status_for, task_lines, worker_outputs, NodeContext};
use crate::engine::WorkerNode;
use crate::routing::AgentRole;
use crate::runner::ToolLoop;
use crate::tools::{task_tools, SharedStore};
use async_trait::async_trait;
use maestro_core::{
    MaestroError, MaestroResult, RunState, StateUpdate, Task, TaskStatus, TaskStore,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{error, info, warn};

const ARCHITECT_PROMPT: &str = "\
You are the software architect. Lay out the project structure, interfaces and \
key design decisions for your task. Keep task statuses current with the task \
tools, then answer with a concise description of the design.";

const CODER_PROMPT: &str = "\
You are the coder. Implement your task following the design produced so far. \
Keep task statuses current with the task tools, then answer with a summary of \
what you implemented.";

const TESTER_PROMPT: &str = "\
You are the tester. Write and run tests for your task, or validate the \
implemented work when you have no specific task. Keep task statuses current \
with the task tools, then answer with a validation report.";

/// An internal pipeline stage backed by the model and the task tools.
///
/// Each execution drains one outstanding task owned by the worker. The
/// routing fallback worker runs a general validation pass when it owns
/// nothing.
pub struct PipelineWorker {
    name: String,
    system_prompt: String,
    ctx: Arc<NodeContext>,
}

impl PipelineWorker {
    /// A worker with a custom prompt.
    pub fn new(
        name: impl Into<String>,
        system_prompt: impl Into<String>,
        ctx: Arc<NodeContext>,
    ) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            ctx,
        }
    }

    /// The software architect.
    pub fn architect(ctx: Arc<NodeContext>) -> Self {
        Self::new(AgentRole::SoftwareArchitect.as_str(), ARCHITECT_PROMPT, ctx)
    }

    /// The coder.
    pub fn coder(ctx: Arc<NodeContext>) -> Self {
        Self::new(AgentRole::Coder.as_str(), CODER_PROMPT, ctx)
    }

    /// The tester.
    pub fn tester(ctx: Arc<NodeContext>) -> Self {
        Self::new(AgentRole::Tester.as_str(), TESTER_PROMPT, ctx)
    }

    fn owns(&self, task: &Task) -> bool {
        task.assigned_to == self.name
            && matches!(task.status, TaskStatus::Pending | TaskStatus::InProgress)
    }

    /// Where control goes once this worker is done.
    fn route_after(&self, tasks: &[Task]) -> String {
        for t in self.ctx.policy.unroutable(tasks) {
            warn!(task_id = %t.id, assigned_to = %t.assigned_to, "Task has no worker; skipping");
        }
        let next = self.ctx.policy.next(tasks, Some(&self.name));
        if next == self.name && !tasks.iter().any(|t| self.owns(t)) {
            AgentRole::Orchestrator.to_string()
        } else {
            next
        }
    }

    fn prompt(&self, state: &RunState, task: Option<&Task>) -> String {
        let mut prompt = format!("Original request:\n{}\n", state.user_request);
        if let Some(plan) = &state.plan {
            prompt.push_str(&format!("\nPlan:\n{plan}\n"));
        }
        prompt.push_str("\nTasks:\n");
        prompt.push_str(&task_lines(&state.tasks));
        prompt.push_str(&worker_outputs(state));

        match task {
            Some(t) => {
                prompt.push_str(&format!("\nYour task [{}]: {}\n", t.id, t.content));
                for r in &t.requirements {
                    prompt.push_str(&format!("- {r}\n"));
                }
            }
            None => prompt.push_str("\nYour task: validate all implemented work.\n"),
        }
        prompt
    }

    async fn run_loop(&self, store: &SharedStore, prompt: String) -> MaestroResult<String> {
        let mut tools = self.ctx.tools.clone();
        tools.extend(task_tools(store));
        ToolLoop::new(self.ctx.generator.as_ref(), &tools, self.ctx.max_turns)
            .run(&self.name, &self.system_prompt, prompt)
            .await
    }

    /// Validation pass when the worker owns no task.
    async fn validate(&self, state: &RunState) -> MaestroResult<StateUpdate> {
        info!(worker = %self.name, "No assigned task; running validation pass");
        let store: SharedStore = Arc::new(Mutex::new(TaskStore::from_tasks(state.tasks.clone())));
        let report = self.run_loop(&store, self.prompt(state, None)).await?;
        let tasks = store.lock().clone().into_tasks();
        let next = self.route_after(&tasks);
        Ok(StateUpdate::goto(next)
            .with_tasks(tasks)
            .with_status(status_for(&self.name))
            .with_result(self.name.as_str(), report))
    }
}

/// Mark `id` completed unless the model already closed it.
fn complete(store: &mut TaskStore, worker: &str, id: &str, text: &str) -> MaestroResult<()> {
    let task = store
        .get_mut(id)
        .ok_or_else(|| MaestroError::NotFound(format!("task {id}")))?;
    match task.status {
        TaskStatus::Completed => {}
        TaskStatus::Failed => {
            return Err(MaestroError::Worker(format!("{worker} marked task {id} as failed")));
        }
        TaskStatus::Retrying => {
            task.transition(TaskStatus::InProgress)?;
            task.transition(TaskStatus::Completed)?;
        }
        _ => task.transition(TaskStatus::Completed)?,
    }
    if task.result.as_deref().map_or(true, str::is_empty) {
        task.result = Some(text.to_string());
    }
    Ok(())
}

#[async_trait]
impl WorkerNode for PipelineWorker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, state: &RunState) -> MaestroResult<StateUpdate> {
        let Some(task) = state.tasks.iter().find(|t| self.owns(t)).cloned() else {
            if self.ctx.policy.fallback == self.name {
                return self.validate(state).await;
            }
            let next = self.route_after(&state.tasks);
            info!(worker = %self.name, next = %next, "Nothing to do");
            return Ok(StateUpdate::goto(next));
        };

        info!(worker = %self.name, task_id = %task.id, "Working on task");
        let store: SharedStore = Arc::new(Mutex::new(TaskStore::from_tasks(state.tasks.clone())));
        store.lock().update_status(&task.id, TaskStatus::InProgress)?;

        let outcome = match self.run_loop(&store, self.prompt(state, Some(&task))).await {
            Ok(text) => complete(&mut store.lock(), &self.name, &task.id, &text).map(|()| text),
            Err(e) => Err(e),
        };
        let mut store = store.lock().clone();

        match outcome {
            Ok(text) => {
                let tasks = store.into_tasks();
                let next = self.route_after(&tasks);
                info!(worker = %self.name, task_id = %task.id, next = %next, "Task completed");
                Ok(StateUpdate::goto(next)
                    .with_tasks(tasks)
                    .with_current_task(Some(task.id))
                    .with_status(status_for(&self.name))
                    .with_result(self.name.as_str(), text))
            }
            Err(e) => {
                let reason = format!("{} failed on task {}: {e}", self.name, task.id);
                error!(worker = %self.name, task_id = %task.id, error = %e, "Task failed");
                if let Some(t) = store.get_mut(&task.id) {
                    t.record_failure(&e.to_string())?;
                }
                Ok(StateUpdate::goto(AgentRole::ErrorRecovery.as_str())
                    .with_tasks(store.into_tasks())
                    .with_current_task(Some(task.id))
                    .with_error(reason))
            }
        }
    }
}
