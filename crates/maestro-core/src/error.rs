use thiserror::Error;

/// Convenience alias used throughout Maestro.
pub type MaestroResult<T> = Result<T, MaestroError>;

/// Top-level error type for Maestro.
///
/// Each variant corresponds to a subsystem that can produce errors. Payloads
/// are human-readable strings so they can be copied verbatim into
/// `Task::last_error` and `RunState::error`.
#[derive(Error, Debug)]
pub enum MaestroError {
    /// A task id that is not present in the store.
    #[error("Task not found: {0}")]
    NotFound(String),

    /// A lifecycle move the task model does not allow.
    #[error("Invalid transition for task {id}: {from} -> {to}")]
    InvalidTransition {
        /// Task id.
        id: String,
        /// Status before the attempted move.
        from: String,
        /// Requested status.
        to: String,
    },

    /// A write to a task that has already completed.
    #[error("Task {0} is completed and can no longer be changed")]
    TaskLocked(String),

    /// A worker node failed while executing.
    #[error("Worker error: {0}")]
    Worker(String),

    /// The workflow engine could not continue.
    #[error("Workflow error: {0}")]
    Workflow(String),

    /// Discovery or registry failure.
    #[error("Registry error: {0}")]
    Registry(String),

    /// Remote dispatch failure.
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// Text-generation (model) failure.
    #[error("Model error: {0}")]
    Model(String),

    /// Tool lookup or execution failure.
    #[error("Tool error: {0}")]
    Tool(String),

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Invalid or missing configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// JSON (de)serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
