//! ReviewEngine: spawns a fresh, read-only, auto-approving agent to judge a
//! task's diff and returns an approve/reject verdict.

use crate::agent::AgentDriver;
use crate::error::KaganError;
use crate::models::Task;
use crate::signal::{parse_signal, ParseContext, Signal};
use crate::workspace::WorkspaceManager;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub approved: bool,
    pub detail: String,
}

pub struct ReviewEngine {
    workspace: Arc<WorkspaceManager>,
    agent_ready_timeout: Duration,
}

impl ReviewEngine {
    pub fn new(workspace: Arc<WorkspaceManager>, agent_ready_timeout: Duration) -> Self {
        Self {
            workspace,
            agent_ready_timeout,
        }
    }

    /// Reviews `task` against `base_branch`, always tearing the review
    /// agent down on the way out regardless of how review ends.
    pub async fn review(
        &self,
        task: &Task,
        base_branch: &str,
        agent_factory: impl FnOnce() -> Arc<dyn AgentDriver>,
    ) -> ReviewOutcome {
        let agent = agent_factory();
        let outcome = self.run_review(task, base_branch, agent.as_ref()).await;
        if let Err(e) = agent.stop().await {
            warn!(task_id = %task.id, error = %e, "review agent failed to stop cleanly");
        }
        outcome
    }

    async fn run_review(&self, task: &Task, base_branch: &str, agent: &dyn AgentDriver) -> ReviewOutcome {
        let Some(worktree) = self.workspace.get_path(task.id).await else {
            return ReviewOutcome {
                approved: false,
                detail: "review agent error: worktree not found".to_string(),
            };
        };

        let prompt = match self.build_review_prompt(task, base_branch).await {
            Ok(prompt) => prompt,
            Err(e) => {
                return ReviewOutcome {
                    approved: false,
                    detail: format!("review agent error: {e}"),
                };
            }
        };

        if let Err(e) = agent.start(&worktree, None, true).await {
            return ReviewOutcome {
                approved: false,
                detail: format!("review agent error: {e}"),
            };
        }

        if let Err(e) = agent.wait_ready(self.agent_ready_timeout).await {
            let detail = if matches!(e, KaganError::Timeout(_)) {
                "review agent timed out".to_string()
            } else {
                format!("review agent error: {e}")
            };
            return ReviewOutcome {
                approved: false,
                detail,
            };
        }

        if let Err(e) = agent.send_prompt(&prompt).await {
            return ReviewOutcome {
                approved: false,
                detail: format!("review agent error: {e}"),
            };
        }

        let response = agent.response_text().await;
        match parse_signal(&response, ParseContext::Review) {
            Signal::Approve { summary } => {
                info!(task_id = %task.id, "review approved");
                ReviewOutcome {
                    approved: true,
                    detail: summary,
                }
            }
            Signal::Reject { reason } => ReviewOutcome {
                approved: false,
                detail: reason,
            },
            _ => ReviewOutcome {
                approved: false,
                detail: "review agent produced no approve/reject signal".to_string(),
            },
        }
    }

    async fn build_review_prompt(&self, task: &Task, base_branch: &str) -> crate::error::Result<String> {
        let commits = self.workspace.commit_log(task.id, base_branch).await?;
        let diff_stats = self.workspace.diff_stats(task.id, base_branch).await?;

        Ok(format!(
            "Review the following change before it is merged.\n\n\
             Task: {}\n\
             ID: {}\n\
             Description:\n{}\n\n\
             Commits:\n{}\n\n\
             Diff stats:\n{}\n\n\
             Respond with <approve summary=\"...\"/> or <reject reason=\"...\"/>.",
            task.title,
            task.id,
            task.description,
            commits.join("\n"),
            diff_stats,
        ))
    }
}
