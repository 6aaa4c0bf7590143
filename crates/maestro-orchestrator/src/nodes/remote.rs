use crate::engine::WorkerNode;
use crate::retry::{RetryManager, RetryState};
use crate::routing::{AgentRole, RoutingPolicy};
use async_trait::async_trait;
use maestro_a2a::client::build_message;
use maestro_a2a::{A2aClient, A2aError, AgentRegistry};
use maestro_core::{MaestroResult, OverallStatus, RunState, StateUpdate, Task, TaskStatus};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Sends one externally assigned task per execution to its registered
/// agent and reconciles the task with the reply.
pub struct RemoteDispatchNode {
    policy: RoutingPolicy,
    registry: Arc<AgentRegistry>,
    client: A2aClient,
    retry: RetryManager,
}

impl RemoteDispatchNode {
    /// Dispatch node sharing `registry`.
    pub fn new(
        policy: RoutingPolicy,
        registry: Arc<AgentRegistry>,
        client: A2aClient,
        retry: RetryManager,
    ) -> Self {
        Self {
            policy,
            registry,
            client,
            retry,
        }
    }

    fn dispatchable(&self, task: &Task) -> bool {
        matches!(task.status, TaskStatus::Pending | TaskStatus::InProgress)
            && self.policy.is_external(&task.assigned_to)
    }

    /// The current task if it is external and outstanding, else the first
    /// such task.
    fn select(&self, state: &RunState) -> Option<usize> {
        state
            .current_task_id
            .as_deref()
            .and_then(|id| state.tasks.iter().position(|t| t.id == id))
            .filter(|&i| self.dispatchable(&state.tasks[i]))
            .or_else(|| state.tasks.iter().position(|t| self.dispatchable(t)))
    }

    fn fail(&self, mut tasks: Vec<Task>, idx: usize, reason: String) -> MaestroResult<StateUpdate> {
        let id = tasks[idx].id.clone();
        error!(task_id = %id, agent = %tasks[idx].assigned_to, error = %reason, "Remote dispatch failed");
        tasks[idx].record_failure(&reason)?;
        Ok(StateUpdate::goto(AgentRole::ErrorRecovery.as_str())
            .with_tasks(tasks)
            .with_current_task(Some(id.clone()))
            .with_error(format!("task {id}: {reason}")))
    }
}

#[async_trait]
impl WorkerNode for RemoteDispatchNode {
    fn name(&self) -> &str {
        &self.policy.remote
    }

    async fn execute(&self, state: &RunState) -> MaestroResult<StateUpdate> {
        let Some(idx) = self.select(state) else {
            let next = self.policy.next(&state.tasks, None);
            warn!(next = %next, "No external task to dispatch");
            return Ok(StateUpdate::goto(next));
        };
        let mut tasks = state.tasks.clone();
        let agent_name = tasks[idx].assigned_to.clone();

        let Some(agent) = self.registry.get(&agent_name).await else {
            let reason = format!("no registered external agent named '{agent_name}'");
            return self.fail(tasks, idx, reason);
        };

        let text = build_message(
            &state.user_request,
            &tasks[idx].content,
            state.plan.as_deref(),
        );
        info!(
            task_id = %tasks[idx].id,
            agent = %agent_name,
            endpoint = %agent.endpoint(),
            mode = ?self.client.mode(),
            "Dispatching task to external agent"
        );

        let tracker = Mutex::new(tasks[idx].clone());
        tracker.lock().transition(TaskStatus::InProgress)?;

        let (client, agent_ref, text_ref, tracker_ref) = (&self.client, &agent, text.as_str(), &tracker);
        let outcome = self
            .retry
            .retry_with_backoff_if(
                move || {
                    {
                        let mut task = tracker_ref.lock();
                        if task.status == TaskStatus::Retrying {
                            if let Err(e) = task.transition(TaskStatus::InProgress) {
                                warn!(error = %e, "Could not resume task");
                            }
                        }
                    }
                    client.send(agent_ref, text_ref)
                },
                A2aError::is_transient,
                |retry: &RetryState| {
                    let mut task = tracker_ref.lock();
                    if let Err(e) = task.transition(TaskStatus::Retrying) {
                        warn!(error = %e, "Could not mark task retrying");
                    }
                    task.progress = Some(format!(
                        "retry {} of {}",
                        retry.attempt + 1,
                        retry.max_retries
                    ));
                },
            )
            .await;

        tasks[idx] = tracker.into_inner();
        match outcome {
            Ok(reply) => {
                let task = &mut tasks[idx];
                task.transition(TaskStatus::Completed)?;
                task.result = Some(reply.clone());
                task.progress = Some("Completed via external A2A agent".into());
                let id = task.id.clone();
                let next = self.policy.next(&tasks, None);
                info!(task_id = %id, agent = %agent_name, next = %next, "External task completed");
                Ok(StateUpdate::goto(next)
                    .with_tasks(tasks)
                    .with_current_task(Some(id))
                    .with_status(OverallStatus::Implementing)
                    .with_result(agent_name, reply))
            }
            Err(e) => self.fail(tasks, idx, format!("{agent_name}: {e}")),
        }
    }
}
