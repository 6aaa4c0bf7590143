use crate::error::{MaestroError, MaestroResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, not yet picked up.
    #[default]
    Pending,
    /// A worker is executing it.
    InProgress,
    /// Finished successfully. Terminal.
    Completed,
    /// Finished unsuccessfully.
    Failed,
    /// Waiting for a backoff period before another attempt.
    Retrying,
}

impl TaskStatus {
    /// Whether moving from `self` to `next` is an allowed lifecycle step.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (Pending, Retrying)
                | (InProgress, Retrying)
                | (Retrying, InProgress)
                | (Retrying, Failed)
                | (Pending, Failed)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Retrying => write!(f, "retrying"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = MaestroError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "retrying" => Ok(TaskStatus::Retrying),
            other => Err(MaestroError::Tool(format!("unknown task status '{other}'"))),
        }
    }
}

/// Rough effort estimate attached by the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    /// Small change.
    Low,
    /// Moderate change.
    Medium,
    /// Large change.
    High,
}

/// A unit of work tracked across the workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Short unique id.
    pub id: String,
    /// What to do.
    pub content: String,
    /// Lifecycle state.
    #[serde(default)]
    pub status: TaskStatus,
    /// Worker name that owns the task. Empty means unassigned.
    #[serde(default, alias = "assignedTo")]
    pub assigned_to: String,
    /// Output text.
    #[serde(default)]
    pub result: Option<String>,
    /// Acceptance criteria.
    #[serde(default)]
    pub requirements: Vec<String>,
    /// Last progress note.
    #[serde(default)]
    pub progress: Option<String>,
    /// Files the worker created.
    #[serde(default)]
    pub files_created: Vec<String>,
    /// Files the worker changed.
    #[serde(default)]
    pub files_modified: Vec<String>,
    /// Ids of tasks that must finish first.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Failed attempts recorded so far.
    #[serde(default)]
    pub retry_count: u32,
    /// Error history, newest last.
    #[serde(default)]
    pub last_error: Option<String>,
    /// Planner's estimate.
    #[serde(default)]
    pub estimated_effort: Option<Effort>,
    /// Measured effort.
    #[serde(default)]
    pub actual_effort: Option<Effort>,
    /// Set when the task completes.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a pending task with a fresh short id.
    pub fn new(content: impl Into<String>, assigned_to: impl Into<String>) -> Self {
        Self::with_id(short_id(), content, assigned_to)
    }

    /// Create a pending task with an explicit id.
    pub fn with_id(
        id: impl Into<String>,
        content: impl Into<String>,
        assigned_to: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            status: TaskStatus::Pending,
            assigned_to: assigned_to.into(),
            result: None,
            requirements: Vec::new(),
            progress: None,
            files_created: Vec::new(),
            files_modified: Vec::new(),
            dependencies: Vec::new(),
            retry_count: 0,
            last_error: None,
            estimated_effort: None,
            actual_effort: None,
            completed_at: None,
        }
    }

    /// Set the requirements.
    pub fn with_requirements(mut self, requirements: Vec<String>) -> Self {
        self.requirements = requirements;
        self
    }

    /// Set the dependencies.
    pub fn with_dependencies(mut self, deps: Vec<String>) -> Self {
        self.dependencies = deps;
        self
    }

    /// Set the estimated effort.
    pub fn with_effort(mut self, effort: Effort) -> Self {
        self.estimated_effort = Some(effort);
        self
    }

    /// True when the task is pending and owned by `worker`.
    pub fn is_pending_for(&self, worker: &str) -> bool {
        self.status == TaskStatus::Pending && self.assigned_to == worker
    }

    /// Move to `next`, rejecting moves the lifecycle does not allow.
    ///
    /// Re-applying the current status is a no-op.
    pub fn transition(&mut self, next: TaskStatus) -> MaestroResult<()> {
        if self.status == next {
            return Ok(());
        }
        if !self.status.can_transition_to(next) {
            return Err(MaestroError::InvalidTransition {
                id: self.id.clone(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        if next == TaskStatus::Completed {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Set the status without lifecycle checks.
    pub fn force_status(&mut self, status: TaskStatus) {
        self.status = status;
        self.completed_at = (status == TaskStatus::Completed).then(Utc::now);
    }

    /// Mark the task failed, appending `error` to its error history.
    pub fn record_failure(&mut self, error: &str) -> MaestroResult<()> {
        self.transition(TaskStatus::Failed)?;
        self.last_error = Some(match self.last_error.take() {
            Some(prev) if !prev.is_empty() => format!("{prev}\n{error}"),
            _ => error.to_string(),
        });
        self.retry_count += 1;
        Ok(())
    }
}

/// First eight hex characters of a v4 UUID.
pub fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}
