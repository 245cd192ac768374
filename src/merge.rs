//! MergeCoordinator: serializes merges across tasks and recovers from
//! mergeable-after-rebase conflicts.

use crate::error::Result;
use crate::models::Task;
use crate::workspace::{GitOutcome, WorkspaceManager};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Debug, Clone)]
pub enum MergeOutcome {
    Merged { message: String },
    RebaseConflict { conflict_files: Vec<String> },
    Failed { message: String },
}

/// Holds the process-wide merge lock for the entire duration of one merge
/// attempt, so two overlapping merges never interleave git operations.
pub struct MergeCoordinator {
    workspace: Arc<WorkspaceManager>,
    merge_lock: Mutex<()>,
    auto_retry_on_conflict: bool,
}

impl MergeCoordinator {
    pub fn new(workspace: Arc<WorkspaceManager>, auto_retry_on_conflict: bool) -> Self {
        Self {
            workspace,
            merge_lock: Mutex::new(()),
            auto_retry_on_conflict,
        }
    }

    pub async fn merge_task(&self, task: &Task, base_branch: &str, squash: bool) -> Result<MergeOutcome> {
        let _guard = self.merge_lock.lock().await;
        info!(task_id = %task.id, "merge lock acquired");

        match self.workspace.rebase_onto(task.id, base_branch).await? {
            GitOutcome::Conflict { conflict_files, .. } => {
                if self.auto_retry_on_conflict {
                    return Ok(MergeOutcome::RebaseConflict { conflict_files });
                }
                return Ok(MergeOutcome::Failed {
                    message: format!("rebase conflict on {base_branch}"),
                });
            }
            GitOutcome::Ok { .. } => {}
        }

        match self.workspace.merge(task.id, &task.title, base_branch, squash).await? {
            GitOutcome::Ok { message } => Ok(MergeOutcome::Merged { message }),
            GitOutcome::Conflict { message, .. } => Ok(MergeOutcome::Failed { message }),
        }
    }
}
