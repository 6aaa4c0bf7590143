//! Multi-agent workflow engine for Maestro.
//!
//! Plans a request into tasks, routes each task to an internal pipeline
//! worker or to an external A2A agent, recovers from failures, and
//! summarises the run. One node executes at a time over a single run state.
//!
//! # Main types
//!
//! - [`Maestro`] — The standard workflow with `run` and `stream` entry points.
//! - [`WorkflowEngine`] — Drives nodes by following `next_agent` until `end`.
//! - [`WorkerNode`] — A named step of the workflow.
//! - [`RoutingPolicy`] — Pure, deterministic choice of the next worker.
//! - [`RetryManager`] — Exponential backoff with jitter around any async operation.
//! - [`TextGenerator`] — Boundary to the language model.
//! - [`OpenAiGenerator`] — OpenAI-compatible chat completions backend.

/// Workflow engine, nodes and event stream.
pub mod engine;
/// Language model boundary and retrying wrapper.
pub mod llm;
/// The standard workflow facade.
pub mod maestro;
/// Planner, pipeline, recovery, summary and remote dispatch nodes.
pub mod nodes;
/// OpenAI-compatible chat completions backend.
pub mod openai;
/// Exponential backoff retries.
pub mod retry;
/// Next-worker selection.
pub mod routing;
/// Bounded model/tool loop used by pipeline workers.
pub mod runner;
/// Task management tools offered to the model.
pub mod tools;

pub use engine::{EngineSettings, NodeEvent, WorkerNode, WorkflowBuilder, WorkflowEngine};
pub use llm::{ChatMessage, Generation, RetryingGenerator, TextGenerator, ToolSpec};
pub use maestro::{Maestro, MaestroBuilder};
pub use openai::{ModelConfig, OpenAiGenerator};
pub use retry::{is_retryable, RetryManager, RetryPolicy, RetryState};
pub use routing::{next_worker, AgentRole, RoutingPolicy};
pub use tools::{task_tools, SharedStore, Tool, ToolRegistry};
