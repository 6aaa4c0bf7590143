use crate::task::{Task, TaskStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Name of the terminal pseudo-node.
pub const END: &str = "end";

/// Run-level status reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    /// The planner is running.
    #[default]
    Planning,
    /// The architect is running.
    Architecting,
    /// Coding or remote dispatch is running.
    Implementing,
    /// The tester is running.
    Testing,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverallStatus::Planning => write!(f, "planning"),
            OverallStatus::Architecting => write!(f, "architecting"),
            OverallStatus::Implementing => write!(f, "implementing"),
            OverallStatus::Testing => write!(f, "testing"),
            OverallStatus::Completed => write!(f, "completed"),
            OverallStatus::Failed => write!(f, "failed"),
        }
    }
}

/// The state record threaded through every node of one run.
///
/// The workflow engine owns it exclusively; nodes get a shared reference and
/// answer with a [`StateUpdate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    /// The top-level request that started the run.
    pub user_request: String,
    /// Working task list.
    pub tasks: Vec<Task>,
    /// Task last picked by a worker.
    pub current_task_id: Option<String>,
    /// Node to run next; `end` stops the run.
    pub next_agent: String,
    /// Plan summary written by the planner.
    pub plan: Option<String>,
    /// Output per worker or external agent name.
    pub implementation_results: HashMap<String, String>,
    /// Coarse run status.
    pub overall_status: OverallStatus,
    /// Pending error for the recovery node.
    pub error: Option<String>,
    /// Number of passes through the recovery node.
    pub iteration_count: u32,
    /// Final summary written when the run ends.
    pub summary: Option<String>,
}

impl RunState {
    /// Initial state for `request`, pointed at `entry`.
    pub fn new(request: impl Into<String>, entry: impl Into<String>) -> Self {
        Self {
            user_request: request.into(),
            next_agent: entry.into(),
            ..Self::default()
        }
    }

    /// Look up a task by id.
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Ids of tasks that ended in failure.
    pub fn failed_task_ids(&self) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Failed)
            .map(|t| t.id.as_str())
            .collect()
    }

    /// True once the run reached the terminal node.
    pub fn is_finished(&self) -> bool {
        self.next_agent == END
    }

    /// Apply a partial update: last writer wins per field, the task list is
    /// replaced wholesale and `implementation_results` is merged per key.
    pub fn merge(&mut self, update: StateUpdate) {
        if let Some(tasks) = update.tasks {
            self.tasks = tasks;
        }
        if let Some(id) = update.current_task_id {
            self.current_task_id = id;
        }
        if let Some(next) = update.next_agent {
            self.next_agent = next;
        }
        if let Some(plan) = update.plan {
            self.plan = Some(plan);
        }
        self.implementation_results
            .extend(update.implementation_results);
        if let Some(status) = update.overall_status {
            self.overall_status = status;
        }
        if let Some(error) = update.error {
            self.error = error;
        }
        if let Some(count) = update.iteration_count {
            self.iteration_count = count;
        }
        if let Some(summary) = update.summary {
            self.summary = Some(summary);
        }
    }
}

/// Partial state returned by a node.
///
/// `None` leaves a field untouched. For nullable fields the inner option is
/// the new value, so `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    /// Replace the task list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<Task>>,
    /// Set or clear the current task.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_task_id: Option<Option<String>>,
    /// Next node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_agent: Option<String>,
    /// Plan summary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    /// Merged per key into the run's results.
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub implementation_results: HashMap<String, String>,
    /// New run status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_status: Option<OverallStatus>,
    /// Set or clear the pending error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Option<String>>,
    /// New recovery pass count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration_count: Option<u32>,
    /// Final summary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl StateUpdate {
    /// An update that only sets the next node.
    pub fn goto(next: impl Into<String>) -> Self {
        Self {
            next_agent: Some(next.into()),
            ..Self::default()
        }
    }

    /// Replace the task list.
    pub fn with_tasks(mut self, tasks: Vec<Task>) -> Self {
        self.tasks = Some(tasks);
        self
    }

    /// Set the current task.
    pub fn with_current_task(mut self, id: Option<String>) -> Self {
        self.current_task_id = Some(id);
        self
    }

    /// Set the run status.
    pub fn with_status(mut self, status: OverallStatus) -> Self {
        self.overall_status = Some(status);
        self
    }

    /// Set the pending error.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(Some(error.into()));
        self
    }

    /// Clear the pending error.
    pub fn clear_error(mut self) -> Self {
        self.error = Some(None);
        self
    }

    /// Record output under `name`.
    pub fn with_result(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.implementation_results.insert(name.into(), text.into());
        self
    }

    /// Set the plan summary.
    pub fn with_plan(mut self, plan: impl Into<String>) -> Self {
        self.plan = Some(plan.into());
        self
    }

    /// Set the final summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}
