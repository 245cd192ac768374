use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque task identifier. Newtype over `Uuid` so driver/store code can't
/// accidentally pass a branch name or a title where a task id is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A task on the board. Owned by `TaskStore`; the core only ever holds a
/// snapshot fetched from the store and writes back through it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub task_type: TaskType,
    pub priority: Priority,
    pub agent_backend: Option<String>,
    pub base_branch: Option<String>,
    pub review_summary: Option<String>,
    pub checks_passed: bool,
    pub merge_failed: bool,
    pub merge_error: Option<String>,
    pub total_iterations: u64,
    pub scratchpad: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Status lifecycle: `Backlog -> InProgress -> Review -> Done`. Backward
/// moves are legal; the Scheduler only reacts to transitions into/out of
/// `InProgress` and into `Review`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Backlog,
    InProgress,
    Review,
    Done,
}

/// AUTO tasks are driven by an agent subprocess without a human in the
/// loop; PAIR tasks run in an external interactive terminal the core only
/// bootstraps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskType {
    Auto,
    Pair,
}

/// Advisory only — does not gate scheduling order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Task {
    /// Creates a new AUTO task in BACKLOG with zeroed execution history.
    pub fn new(title: String, description: String, priority: Priority) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: TaskId::new(),
            title,
            description,
            status: TaskStatus::Backlog,
            task_type: TaskType::Auto,
            priority,
            agent_backend: None,
            base_branch: None,
            review_summary: None,
            checks_passed: false,
            merge_failed: false,
            merge_error: None,
            total_iterations: 0,
            scratchpad: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_task_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    pub fn with_agent_backend(mut self, agent_backend: impl Into<String>) -> Self {
        self.agent_backend = Some(agent_backend.into());
        self
    }

    pub fn with_base_branch(mut self, base_branch: impl Into<String>) -> Self {
        self.base_branch = Some(base_branch.into());
        self
    }

    /// Resolves the base branch to use for this task: its own override, or
    /// the operator-configured default.
    pub fn effective_base_branch<'a>(&'a self, default_base_branch: &'a str) -> &'a str {
        self.base_branch.as_deref().unwrap_or(default_base_branch)
    }

    /// Clears review/merge state left over from a prior IN_PROGRESS visit.
    /// Called at the start of every `run_task_loop` per the run_task_loop
    /// contract.
    pub fn clear_review_and_merge_state(&mut self) {
        self.checks_passed = false;
        self.review_summary = None;
        self.merge_failed = false;
        self.merge_error = None;
    }
}

/// Per-IN_PROGRESS-visit state. Owned by the Scheduler, never persisted.
/// `session_iteration` is the "leash" counter for the current visit, distinct
/// from the lifetime odometer `Task::total_iterations`.
pub struct RunningTaskState {
    pub agent: Option<std::sync::Arc<dyn crate::agent::AgentDriver>>,
    pub cancel: tokio_util::sync::CancellationToken,
    pub session_iteration: u32,
}

impl RunningTaskState {
    pub fn new(cancel: tokio_util::sync::CancellationToken) -> Self {
        Self {
            agent: None,
            cancel,
            session_iteration: 0,
        }
    }
}

/// A single message recorded during an agent run, for the ExecutionRun log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RecordedMessage {
    Text(String),
    ToolCall { id: String, title: String },
    Error(String),
}

/// A per-IN_PROGRESS-visit record: the ordered list of agent messages and
/// the terminal signal that ended the visit. Persisted by TaskStore so the
/// UI can replay history; the core never reads these back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRun {
    pub task_id: TaskId,
    pub session_iteration_count: u32,
    pub messages: Vec<RecordedMessage>,
    pub terminal_signal: Option<String>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub ended_at: chrono::DateTime<chrono::Utc>,
}
