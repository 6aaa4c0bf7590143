//! Core types and error definitions for the Maestro orchestration engine.
//!
//! This crate provides the foundational types shared across all Maestro crates:
//! the unified error type, the task model with its lifecycle rules, the
//! per-run task store, the shared run state and normalized tool calls.
//!
//! # Main types
//!
//! - [`MaestroError`] — Unified error enum for all Maestro subsystems.
//! - [`MaestroResult`] — Convenience alias for `Result<T, MaestroError>`.
//! - [`Task`] — A unit of work tracked across the workflow.
//! - [`TaskStatus`] — Lifecycle state of a task.
//! - [`TaskStore`] — Ordered, per-run collection of tasks.
//! - [`RunState`] — The single state record threaded through every worker.
//! - [`StateUpdate`] — Partial update returned by a worker and merged into the state.
//! - [`ToolCall`] — A model-initiated tool invocation in normalized form.

/// Error types.
pub mod error;
/// Shared run state and partial updates.
pub mod state;
/// Ordered per-run task store.
pub mod store;
/// Task data model and lifecycle.
pub mod task;
/// Tool call normalization and results.
pub mod tool;

pub use error::{MaestroError, MaestroResult};
pub use state::{OverallStatus, RunState, StateUpdate, END};
pub use store::TaskStore;
pub use task::{Effort, Task, TaskStatus};
pub use tool::{ToolCall, ToolResult};
