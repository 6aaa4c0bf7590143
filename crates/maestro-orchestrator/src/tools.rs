use crate::llm::ToolSpec;
use async_trait::async_trait;
use maestro_core::{MaestroError, MaestroResult, Task, TaskStatus, TaskStore, ToolCall, ToolResult};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Task store shared between the tools of one worker execution.
pub type SharedStore = Arc<Mutex<TaskStore>>;

/// A tool a worker's model may call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name, description and JSON schema.
    fn spec(&self) -> &ToolSpec;

    /// Run the call. Errors become error results for the model.
    async fn execute(&self, call: &ToolCall) -> MaestroResult<ToolResult>;
}

/// Named collection of tools available to a worker.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.spec().name.clone();
        info!(tool = %name, "Registered tool");
        self.tools.insert(name, tool);
    }

    /// Add tools, replacing same-named ones.
    pub fn extend(&mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) {
        for tool in tools {
            self.register(tool);
        }
    }

    /// Look up a tool.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Specs for the model.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|t| t.spec().clone()).collect()
    }

    /// Number of tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// True when empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run a call. Unknown tools and tool failures come back as error
    /// results so the model can see them.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let Some(tool) = self.tools.get(&call.name) else {
            warn!(tool = %call.name, "Unknown tool requested");
            return ToolResult::error(&call.id, format!("Unknown tool: {}", call.name));
        };
        match tool.execute(call).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool failed");
                ToolResult::error(&call.id, e.to_string())
            }
        }
    }
}

fn str_arg<'a>(call: &'a ToolCall, key: &str) -> MaestroResult<&'a str> {
    call.args
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| MaestroError::Tool(format!("{}: missing string argument '{key}'", call.name)))
}

fn task_view(t: &Task) -> Value {
    json!({
        "id": t.id,
        "content": t.content,
        "status": t.status,
        "assigned_to": t.assigned_to,
        "result": t.result,
    })
}

/// Sets a task's status.
pub struct UpdateTaskStatus {
    spec: ToolSpec,
    store: SharedStore,
}

impl UpdateTaskStatus {
    /// Bound to `store`.
    pub fn new(store: SharedStore) -> Self {
        Self {
            spec: ToolSpec {
                name: "update_task_status".into(),
                description: "Update the status of a task (pending, in_progress, completed, failed)."
                    .into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "task_id": {"type": "string"},
                        "status": {"type": "string", "enum": ["pending", "in_progress", "completed", "failed"]}
                    },
                    "required": ["task_id", "status"]
                }),
            },
            store,
        }
    }
}

#[async_trait]
impl Tool for UpdateTaskStatus {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, call: &ToolCall) -> MaestroResult<ToolResult> {
        let id = str_arg(call, "task_id")?;
        let status: TaskStatus = str_arg(call, "status")?.parse()?;
        self.store.lock().update_status(id, status)?;
        Ok(ToolResult::success(&call.id, format!("Task {id} is now {status}")))
    }
}

/// Records a task's result text.
pub struct UpdateTaskResult {
    spec: ToolSpec,
    store: SharedStore,
}

impl UpdateTaskResult {
    /// Bound to `store`.
    pub fn new(store: SharedStore) -> Self {
        Self {
            spec: ToolSpec {
                name: "update_task_result".into(),
                description: "Record the result of a task. Call before marking it completed.".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "task_id": {"type": "string"},
                        "result": {"type": "string"}
                    },
                    "required": ["task_id", "result"]
                }),
            },
            store,
        }
    }
}

#[async_trait]
impl Tool for UpdateTaskResult {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, call: &ToolCall) -> MaestroResult<ToolResult> {
        let id = str_arg(call, "task_id")?;
        let result = str_arg(call, "result")?;
        self.store.lock().update_result(id, result)?;
        Ok(ToolResult::success(&call.id, format!("Result recorded for task {id}")))
    }
}

/// Lists every task.
pub struct GetAllTasks {
    spec: ToolSpec,
    store: SharedStore,
}

impl GetAllTasks {
    /// Bound to `store`.
    pub fn new(store: SharedStore) -> Self {
        Self {
            spec: ToolSpec {
                name: "get_all_tasks".into(),
                description: "List all tasks with their status and owner.".into(),
                parameters: json!({"type": "object", "properties": {}}),
            },
            store,
        }
    }
}

#[async_trait]
impl Tool for GetAllTasks {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, call: &ToolCall) -> MaestroResult<ToolResult> {
        let tasks: Vec<Value> = self.store.lock().all().iter().map(task_view).collect();
        Ok(ToolResult::success(&call.id, Value::Array(tasks).to_string()))
    }
}

/// Lists pending tasks, optionally for one worker.
pub struct GetPendingTasks {
    spec: ToolSpec,
    store: SharedStore,
}

impl GetPendingTasks {
    /// Bound to `store`.
    pub fn new(store: SharedStore) -> Self {
        Self {
            spec: ToolSpec {
                name: "get_pending_tasks".into(),
                description: "List pending tasks, optionally only those assigned to one worker."
                    .into(),
                parameters: json!({
                    "type": "object",
                    "properties": {"assigned_to": {"type": "string"}}
                }),
            },
            store,
        }
    }
}

#[async_trait]
impl Tool for GetPendingTasks {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, call: &ToolCall) -> MaestroResult<ToolResult> {
        let owner = call.args.get("assigned_to").and_then(Value::as_str);
        let tasks: Vec<Value> = self
            .store
            .lock()
            .pending()
            .filter(|t| owner.map_or(true, |o| t.assigned_to == o))
            .map(task_view)
            .collect();
        Ok(ToolResult::success(&call.id, Value::Array(tasks).to_string()))
    }
}

/// The four task-management tools bound to `store`.
pub fn task_tools(store: &SharedStore) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(UpdateTaskStatus::new(store.clone())),
        Arc::new(UpdateTaskResult::new(store.clone())),
        Arc::new(GetAllTasks::new(store.clone())),
        Arc::new(GetPendingTasks::new(store.clone())),
    ]
}
