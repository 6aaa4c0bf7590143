use maestro_core::{Task, TaskStatus};
use serde::{Deserialize, Serialize};

/// Built-in worker and control-plane nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Decomposes the request into tasks.
    Planner,
    /// Designs structure and interfaces.
    SoftwareArchitect,
    /// Implements the design.
    Coder,
    /// Validates the work. Also the routing fallback.
    Tester,
    /// Handles errors recorded in the run state.
    ErrorRecovery,
    /// Writes the final summary.
    Orchestrator,
    /// Sends tasks to external agents.
    A2aClient,
}

impl AgentRole {
    /// Node name.
    pub fn as_str(self) -> &'static str {
        match self {
            AgentRole::Planner => "planner",
            AgentRole::SoftwareArchitect => "software_architect",
            AgentRole::Coder => "coder",
            AgentRole::Tester => "tester",
            AgentRole::ErrorRecovery => "error_recovery",
            AgentRole::Orchestrator => "orchestrator",
            AgentRole::A2aClient => "a2a_client",
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tasks the routing policy treats as outstanding.
fn is_outstanding(task: &Task) -> bool {
    matches!(task.status, TaskStatus::Pending | TaskStatus::InProgress)
}

/// Decide which worker runs next.
///
/// Order: the preferred worker while it still owns outstanding work, then
/// `internal_workers` in declared order, then `remote` if some outstanding
/// task names a worker that is neither internal nor control-plane, and
/// finally `fallback`. Pure and deterministic.
pub fn next_worker<'a, S: AsRef<str>>(
    tasks: &[Task],
    preferred: Option<&'a str>,
    internal_workers: &'a [S],
    control_plane: &'a [S],
    remote: &'a str,
    fallback: &'a str,
) -> &'a str {
    let outstanding: Vec<&Task> = tasks.iter().filter(|t| is_outstanding(t)).collect();
    let has_work = |worker: &str| outstanding.iter().any(|t| t.assigned_to == worker);

    if let Some(preferred) = preferred.filter(|p| has_work(*p)) {
        return preferred;
    }

    if let Some(worker) = internal_workers.iter().find(|w| has_work(w.as_ref())) {
        return worker.as_ref();
    }

    let known = |name: &str| {
        internal_workers.iter().any(|w| w.as_ref() == name)
            || control_plane.iter().any(|w| w.as_ref() == name)
    };
    if outstanding
        .iter()
        .any(|t| !t.assigned_to.is_empty() && !known(&t.assigned_to))
    {
        return remote;
    }

    fallback
}

/// Routing configuration for a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingPolicy {
    /// Internal workers in pipeline order.
    pub internal_workers: Vec<String>,
    /// Node names that never own tasks.
    pub control_plane: Vec<String>,
    /// Node that dispatches to external agents.
    pub remote: String,
    /// Worker chosen when nothing else matches.
    pub fallback: String,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            internal_workers: [
                AgentRole::SoftwareArchitect,
                AgentRole::Coder,
                AgentRole::Tester,
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            control_plane: [
                AgentRole::Planner,
                AgentRole::Orchestrator,
                AgentRole::ErrorRecovery,
                AgentRole::A2aClient,
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            remote: AgentRole::A2aClient.to_string(),
            fallback: AgentRole::Tester.to_string(),
        }
    }
}

impl RoutingPolicy {
    /// [`next_worker`] with this policy's names.
    pub fn next(&self, tasks: &[Task], preferred: Option<&str>) -> String {
        next_worker(
            tasks,
            preferred,
            self.internal_workers.as_slice(),
            self.control_plane.as_slice(),
            &self.remote,
            &self.fallback,
        )
        .to_string()
    }

    /// True for pipeline workers.
    pub fn is_internal(&self, name: &str) -> bool {
        self.internal_workers.iter().any(|w| w == name)
    }

    /// True for engine-owned nodes.
    pub fn is_control_plane(&self, name: &str) -> bool {
        self.control_plane.iter().any(|w| w == name)
    }

    /// True when `name` would be routed to the remote node.
    pub fn is_external(&self, name: &str) -> bool {
        !name.is_empty() && !self.is_internal(name) && !self.is_control_plane(name)
    }

    /// Outstanding tasks no worker will ever pick up: unassigned, or
    /// assigned to a control-plane node.
    pub fn unroutable<'t>(&self, tasks: &'t [Task]) -> Vec<&'t Task> {
        tasks
            .iter()
            .filter(|t| is_outstanding(t))
            .filter(|t| t.assigned_to.is_empty() || self.is_control_plane(&t.assigned_to))
            .collect()
    }
}
