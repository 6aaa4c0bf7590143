use async_trait::async_trait;
use futures_util::{FutureExt, Stream};
use maestro_core::{MaestroError, MaestroResult, OverallStatus, RunState, StateUpdate, END};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Pseudo-node name used for events the engine emits itself.
pub const ENGINE_NODE: &str = "engine";

/// A named step of the workflow.
#[async_trait]
pub trait WorkerNode: Send + Sync {
    /// Name other nodes route to.
    fn name(&self) -> &str;

    /// Do the node's work and say where control goes next via
    /// `StateUpdate::next_agent`.
    async fn execute(&self, state: &RunState) -> MaestroResult<StateUpdate>;
}

/// One node execution, as yielded by [`WorkflowEngine::stream`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEvent {
    /// Node that ran, or `engine`.
    pub node: String,
    /// What the node changed.
    pub update: StateUpdate,
}

/// Loop-guard settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Passes through the recovery node allowed per run.
    pub max_recovery_passes: u32,
    /// Node executions allowed per run.
    pub max_steps: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_recovery_passes: 5,
            max_steps: 100,
        }
    }
}

/// Builds a [`WorkflowEngine`]; node names are resolved once here.
pub struct WorkflowBuilder {
    nodes: HashMap<String, Arc<dyn WorkerNode>>,
    entry: String,
    recovery: Option<String>,
    settings: EngineSettings,
}

impl WorkflowBuilder {
    /// Start a workflow whose first node is `entry`.
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            nodes: HashMap::new(),
            entry: entry.into(),
            recovery: None,
            settings: EngineSettings::default(),
        }
    }

    /// Add a node under its own name, replacing any node of the same name.
    pub fn node(mut self, node: Arc<dyn WorkerNode>) -> Self {
        self.nodes.insert(node.name().to_string(), node);
        self
    }

    /// Node that receives control after a node fails.
    pub fn recovery(mut self, name: impl Into<String>) -> Self {
        self.recovery = Some(name.into());
        self
    }

    /// Override the loop ceilings.
    pub fn settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Validate the entry and recovery names.
    pub fn build(self) -> MaestroResult<WorkflowEngine> {
        if !self.nodes.contains_key(&self.entry) {
            return Err(MaestroError::Workflow(format!(
                "entry node '{}' is not registered",
                self.entry
            )));
        }
        if let Some(recovery) = self.recovery.as_ref().filter(|r| !self.nodes.contains_key(*r)) {
            return Err(MaestroError::Workflow(format!(
                "recovery node '{recovery}' is not registered"
            )));
        }
        if self.nodes.contains_key(END) {
            return Err(MaestroError::Workflow(format!("'{END}' is reserved")));
        }
        Ok(WorkflowEngine {
            nodes: self.nodes,
            entry: self.entry,
            recovery: self.recovery,
            settings: self.settings,
        })
    }
}

/// Drives a run: execute the current node, merge its update, follow
/// `next_agent` until it reads `end`.
///
/// Exactly one node runs at a time. Node errors and panics are recorded in
/// `state.error` and routed to the recovery node.
pub struct WorkflowEngine {
    nodes: HashMap<String, Arc<dyn WorkerNode>>,
    entry: String,
    recovery: Option<String>,
    settings: EngineSettings,
}

/// In-flight run.
struct Execution {
    state: RunState,
    steps: u32,
}

impl WorkflowEngine {
    /// Start building an engine.
    pub fn builder(entry: impl Into<String>) -> WorkflowBuilder {
        WorkflowBuilder::new(entry)
    }

    /// First node of every run.
    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Registered node names, sorted.
    pub fn node_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Initial state for `request`.
    pub fn initial_state(&self, request: &str) -> RunState {
        RunState::new(request, self.entry.clone())
    }

    /// Run to completion and return the final state.
    pub async fn run(&self, request: &str) -> RunState {
        self.run_from(self.initial_state(request)).await
    }

    /// Run to completion from an arbitrary state.
    pub async fn run_from(&self, state: RunState) -> RunState {
        let mut exec = Execution { state, steps: 0 };
        while self.step(&mut exec).await.is_some() {}
        info!(
            status = %exec.state.overall_status,
            steps = exec.steps,
            tasks = exec.state.tasks.len(),
            "Workflow finished"
        );
        exec.state
    }

    /// Run and yield one event per node execution. The stream ends when the
    /// run reaches `end`.
    pub fn stream(
        self: &Arc<Self>,
        request: &str,
    ) -> impl Stream<Item = NodeEvent> + Send + 'static {
        let exec = Execution {
            state: self.initial_state(request),
            steps: 0,
        };
        futures_util::stream::unfold((Arc::clone(self), exec), |(engine, mut exec)| async move {
            let event = engine.step(&mut exec).await?;
            Some((event, (engine, exec)))
        })
    }

    /// Execute one node. `None` once the run has ended.
    async fn step(&self, exec: &mut Execution) -> Option<NodeEvent> {
        let name = exec.state.next_agent.clone();
        if name == END {
            return None;
        }

        if exec.steps >= self.settings.max_steps {
            let reason = format!("run exceeded {} node executions", self.settings.max_steps);
            return Some(self.terminate(exec, reason));
        }

        if self.recovery.as_deref() == Some(name.as_str()) {
            if exec.state.iteration_count >= self.settings.max_recovery_passes {
                let reason = format!(
                    "recovery ceiling of {} passes reached; last error: {}",
                    self.settings.max_recovery_passes,
                    exec.state.error.as_deref().unwrap_or("none")
                );
                return Some(self.terminate(exec, reason));
            }
            exec.state.iteration_count += 1;
        }

        exec.steps += 1;
        info!(node = %name, step = exec.steps, "Executing node");

        let outcome = match self.nodes.get(&name) {
            Some(node) => match AssertUnwindSafe(node.execute(&exec.state))
                .catch_unwind()
                .await
            {
                Ok(Ok(update)) if update.next_agent.is_some() => Ok(update),
                Ok(Ok(_)) => Err(format!("node '{name}' did not name a next node")),
                Ok(Err(e)) => Err(e.to_string()),
                Err(panic) => Err(format!("node '{name}' panicked: {}", panic_message(&*panic))),
            },
            None => Err(format!("unknown node '{name}'")),
        };

        let update = match outcome {
            Ok(update) => update,
            Err(reason) => self.failure_update(&exec.state, &name, reason),
        };
        exec.state.merge(update.clone());
        Some(NodeEvent { node: name, update })
    }

    /// Where control goes after `node` failed.
    fn failure_update(&self, state: &RunState, node: &str, reason: String) -> StateUpdate {
        let fatal_entry = node == self.entry && state.tasks.is_empty();
        match self.recovery.as_deref() {
            Some(recovery) if !fatal_entry => {
                warn!(node = %node, error = %reason, recovery = %recovery, "Node failed, routing to recovery");
                StateUpdate::goto(recovery).with_error(reason)
            }
            _ => {
                error!(node = %node, error = %reason, "Node failed, terminating run");
                StateUpdate::goto(END)
                    .with_error(reason)
                    .with_status(OverallStatus::Failed)
            }
        }
    }

    fn terminate(&self, exec: &mut Execution, reason: String) -> NodeEvent {
        error!(error = %reason, "Workflow force-terminated");
        let update = StateUpdate::goto(END)
            .with_error(reason)
            .with_status(OverallStatus::Failed);
        exec.state.merge(update.clone());
        NodeEvent {
            node: ENGINE_NODE.to_string(),
            update,
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use maestro_core::Task;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Node whose behaviour is a closure over the state.
    struct FnNode<F> {
        name: &'static str,
        calls: AtomicU32,
        f: F,
    }

    impl<F> FnNode<F>
    where
        F: Fn(&RunState) -> MaestroResult<StateUpdate> + Send + Sync + 'static,
    {
        fn arc(name: &'static str, f: F) -> Arc<Self> {
            Arc::new(Self {
                name,
                calls: AtomicU32::new(0),
                f,
            })
        }
    }

    #[async_trait]
    impl<F> WorkerNode for FnNode<F>
    where
        F: Fn(&RunState) -> MaestroResult<StateUpdate> + Send + Sync + 'static,
    {
        fn name(&self) -> &str {
            self.name
        }

        async fn execute(&self, state: &RunState) -> MaestroResult<StateUpdate> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.f)(state)
        }
    }

    fn planner_with_task() -> Arc<FnNode<impl Fn(&RunState) -> MaestroResult<StateUpdate> + Send + Sync>> {
        FnNode::arc("planner", |_| {
            Ok(StateUpdate::goto("worker").with_tasks(vec![Task::with_id("t1", "x", "worker")]))
        })
    }

    #[tokio::test]
    async fn follows_next_agent_until_end() {
        let worker = FnNode::arc("worker", |_| {
            Ok(StateUpdate::goto(END).with_status(OverallStatus::Completed))
        });
        let engine = WorkflowEngine::builder("planner")
            .node(planner_with_task())
            .node(worker.clone())
            .build()
            .unwrap();

        let state = engine.run("do it").await;
        assert_eq!(state.overall_status, OverallStatus::Completed);
        assert_eq!(state.user_request, "do it");
        assert_eq!(state.tasks.len(), 1);
        assert_eq!(worker.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn loop_guard_stops_self_routing_recovery() {
        let recovery = FnNode::arc("error_recovery", |_| Ok(StateUpdate::goto("error_recovery")));
        let failing = FnNode::arc("worker", |_| Err(MaestroError::Worker("boom".into())));
        let engine = WorkflowEngine::builder("planner")
            .node(planner_with_task())
            .node(failing)
            .node(recovery.clone())
            .recovery("error_recovery")
            .settings(EngineSettings {
                max_recovery_passes: 5,
                max_steps: 1_000,
            })
            .build()
            .unwrap();

        let state = engine.run("x").await;
        assert_eq!(state.overall_status, OverallStatus::Failed);
        assert_eq!(recovery.calls.load(Ordering::SeqCst), 5);
        assert_eq!(state.iteration_count, 5);
        assert!(state.error.unwrap().contains("recovery ceiling"));
    }

    #[tokio::test]
    async fn node_error_is_recorded_and_routed_to_recovery() {
        let failing = FnNode::arc("worker", |_| Err(MaestroError::Worker("disk full".into())));
        let recovery = FnNode::arc("error_recovery", |s: &RunState| {
            assert!(s.error.as_deref().unwrap().contains("disk full"));
            Ok(StateUpdate::goto(END)
                .clear_error()
                .with_status(OverallStatus::Completed))
        });
        let engine = WorkflowEngine::builder("planner")
            .node(planner_with_task())
            .node(failing)
            .node(recovery.clone())
            .recovery("error_recovery")
            .build()
            .unwrap();

        let state = engine.run("x").await;
        assert_eq!(recovery.calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.overall_status, OverallStatus::Completed);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn panics_are_caught() {
        let panicking = FnNode::arc("worker", |_| -> MaestroResult<StateUpdate> {
            panic!("worker exploded")
        });
        let engine = WorkflowEngine::builder("planner")
            .node(planner_with_task())
            .node(panicking)
            .build()
            .unwrap();

        let state = engine.run("x").await;
        assert_eq!(state.overall_status, OverallStatus::Failed);
        assert!(state.error.unwrap().contains("worker exploded"));
        assert_eq!(state.tasks.len(), 1);
    }

    #[tokio::test]
    async fn entry_failure_without_tasks_is_fatal() {
        let planner = FnNode::arc("planner", |_| Err(MaestroError::Model("no model".into())));
        let recovery = FnNode::arc("error_recovery", |_| Ok(StateUpdate::goto(END)));
        let engine = WorkflowEngine::builder("planner")
            .node(planner)
            .node(recovery.clone())
            .recovery("error_recovery")
            .build()
            .unwrap();

        let state = engine.run("x").await;
        assert_eq!(state.overall_status, OverallStatus::Failed);
        assert_eq!(recovery.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_next_node_terminates_without_recovery() {
        let planner = FnNode::arc("planner", |_| {
            Ok(StateUpdate::goto("nobody").with_tasks(vec![Task::with_id("t", "x", "nobody")]))
        });
        let engine = WorkflowEngine::builder("planner").node(planner).build().unwrap();
        let state = engine.run("x").await;
        assert_eq!(state.overall_status, OverallStatus::Failed);
        assert!(state.error.unwrap().contains("unknown node 'nobody'"));
    }

    #[tokio::test]
    async fn step_ceiling_stops_oscillation() {
        let a = FnNode::arc("a", |_| Ok(StateUpdate::goto("b")));
        let b = FnNode::arc("b", |_| Ok(StateUpdate::goto("a")));
        let engine = WorkflowEngine::builder("a")
            .node(a)
            .node(b)
            .settings(EngineSettings {
                max_recovery_passes: 5,
                max_steps: 7,
            })
            .build()
            .unwrap();
        let state = engine.run("x").await;
        assert_eq!(state.overall_status, OverallStatus::Failed);
        assert!(state.is_finished());
    }

    #[tokio::test]
    async fn stream_yields_one_event_per_node() {
        let worker = FnNode::arc("worker", |_| Ok(StateUpdate::goto(END)));
        let engine = Arc::new(
            WorkflowEngine::builder("planner")
                .node(planner_with_task())
                .node(worker)
                .build()
                .unwrap(),
        );
        let events: Vec<NodeEvent> = engine.stream("x").collect().await;
        let nodes: Vec<&str> = events.iter().map(|e| e.node.as_str()).collect();
        assert_eq!(nodes, vec!["planner", "worker"]);
        assert_eq!(events[1].update.next_agent.as_deref(), Some(END));
    }

    #[test]
    fn builder_validates_names() {
        assert!(WorkflowEngine::builder("planner").build().is_err());
        assert!(WorkflowEngine::builder("planner")
            .node(planner_with_task())
            .recovery("missing")
            .build()
            .is_err());
    }
}
