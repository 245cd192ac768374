use thiserror::Error;

/// Convenience type alias for Results with KaganError
pub type Result<T> = std::result::Result<T, KaganError>;

/// Main error type for the Kagan task-execution core.
///
/// Every variant here corresponds to an error kind a caller needs to react
/// to differently; the per-task loop catches all of these at its boundary
/// and converts them into status transitions rather than letting them
/// propagate out of the Scheduler.
#[derive(Error, Debug)]
pub enum KaganError {
    #[error("agent failed to start: {message}")]
    AgentStartupFailure { message: String },

    #[error("agent runtime error for task {task_id}: {message}")]
    AgentRuntimeError { task_id: String, message: String },

    #[error("merge precondition failed: {message}")]
    MergePreconditionFailure { message: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("git {command} failed (exit {exit_code}): {stderr}")]
    GitCommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("worktree not found for task {0}")]
    WorktreeNotFound(String),

    #[error("task validation error: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
