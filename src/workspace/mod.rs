//! 🗂️ WORKSPACE MANAGER: per-task isolated git worktrees on dedicated branches
//!
//! All git operations shell out to the `git` CLI via `tokio::process::Command`
//! since this runs on the same async runtime as the Scheduler. Every branch
//! name, task id, and title-derived slug that reaches a shell argument is
//! sanitized to `[a-z0-9_-]`, lowercased, and length-capped first — the same
//! defensive posture as the rest of the git-shelling code in this crate.

mod commit_message;
mod sanitize;

pub use commit_message::generate_semantic_commit_message;
pub use sanitize::{sanitize_branch_component, slugify};

use crate::constants::GENERATED_FILE_PATTERNS;
use crate::error::{KaganError, Result};
use crate::models::TaskId;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Outcome of a rebase or merge attempt against a base branch.
#[derive(Debug, Clone)]
pub enum GitOutcome {
    Ok { message: String },
    Conflict { message: String, conflict_files: Vec<String> },
}

pub struct WorkspaceManager {
    root: PathBuf,
    repo_dir: PathBuf,
    worktrees: RwLock<std::collections::HashMap<TaskId, PathBuf>>,
}

impl WorkspaceManager {
    pub fn new(root: PathBuf, repo_dir: PathBuf) -> Self {
        Self {
            root,
            repo_dir,
            worktrees: RwLock::new(std::collections::HashMap::new()),
        }
    }

    fn branch_name(task_id: TaskId, title: &str) -> String {
        format!("kagan/{}-{}", task_id, slugify(title))
    }

    fn worktree_path(&self, task_id: TaskId) -> PathBuf {
        self.root.join(format!("task-{}", task_id))
    }

    async fn run_git(&self, args: &[&str]) -> Result<std::process::Output> {
        self.run_git_in(&self.repo_dir, args).await
    }

    async fn run_git_in(&self, dir: &Path, args: &[&str]) -> Result<std::process::Output> {
        debug!(?dir, ?args, "running git command");
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;
        Ok(output)
    }

    fn require_success(command: &str, output: &std::process::Output) -> Result<()> {
        if output.status.success() {
            Ok(())
        } else {
            Err(KaganError::GitCommandFailed {
                command: command.to_string(),
                exit_code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    /// Creates (or returns the existing) worktree for `task_id`, on a branch
    /// forked from `base_branch`.
    pub async fn create(&self, task_id: TaskId, title: &str, base_branch: &str) -> Result<PathBuf> {
        if let Some(existing) = self.get_path(task_id).await {
            return Ok(existing);
        }

        let branch = Self::branch_name(task_id, title);
        let base_branch = sanitize_branch_component(base_branch);
        let path = self.worktree_path(task_id);

        tokio::fs::create_dir_all(&self.root).await?;

        let path_str = path.to_string_lossy().to_string();
        let output = self
            .run_git(&["worktree", "add", "-b", &branch, &path_str, &base_branch])
            .await?;
        Self::require_success("worktree add", &output)?;

        self.worktrees.write().await.insert(task_id, path.clone());
        info!(%task_id, %branch, "created worktree");
        Ok(path)
    }

    pub async fn get_path(&self, task_id: TaskId) -> Option<PathBuf> {
        self.worktrees.read().await.get(&task_id).cloned()
    }

    /// Removes the worktree and, optionally, its branch.
    pub async fn delete(&self, task_id: TaskId, delete_branch: bool) -> Result<()> {
        let Some(path) = self.get_path(task_id).await else {
            return Ok(());
        };
        let path_str = path.to_string_lossy().to_string();

        let output = self
            .run_git(&["worktree", "remove", "--force", &path_str])
            .await?;
        Self::require_success("worktree remove", &output)?;

        if delete_branch {
            let branches = self.list_task_branches(task_id).await?;
            for branch in branches {
                let output = self.run_git(&["branch", "-D", &branch]).await?;
                if !output.status.success() {
                    warn!(%task_id, %branch, "failed to delete branch after worktree removal");
                }
            }
        }

        self.worktrees.write().await.remove(&task_id);
        Ok(())
    }

    async fn list_task_branches(&self, task_id: TaskId) -> Result<Vec<String>> {
        let prefix = format!("kagan/{}-", task_id);
        let output = self
            .run_git(&["branch", "--list", &format!("{prefix}*")])
            .await?;
        Self::require_success("branch --list", &output)?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|l| l.trim_start_matches('*').trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }

    /// True iff the worktree has modifications not covered by
    /// `GENERATED_FILE_PATTERNS`.
    pub async fn has_uncommitted_changes(&self, task_id: TaskId) -> Result<bool> {
        let Some(path) = self.get_path(task_id).await else {
            return Err(KaganError::WorktreeNotFound(task_id.to_string()));
        };

        self.dirty_ignoring_generated(&path).await
    }

    /// True iff `self.repo_dir` — the base checkout `merge()` actually
    /// `checkout`s and merges into — has modifications not covered by
    /// `GENERATED_FILE_PATTERNS`.
    async fn base_has_uncommitted_changes(&self) -> Result<bool> {
        let repo_dir = self.repo_dir.clone();
        self.dirty_ignoring_generated(&repo_dir).await
    }

    async fn dirty_ignoring_generated(&self, dir: &Path) -> Result<bool> {
        let output = self.run_git_in(dir, &["status", "--porcelain"]).await?;
        Self::require_success("status --porcelain", &output)?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines() {
            let Some(file_path) = line.get(3..) else {
                continue;
            };
            if !is_generated_path(file_path) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Commits on the task branch not present on `base_branch`, newest first.
    pub async fn commit_log(&self, task_id: TaskId, base_branch: &str) -> Result<Vec<String>> {
        let Some(path) = self.get_path(task_id).await else {
            return Err(KaganError::WorktreeNotFound(task_id.to_string()));
        };
        let base_branch = sanitize_branch_component(base_branch);
        let range = format!("{base_branch}..HEAD");

        let output = self
            .run_git_in(&path, &["log", "--oneline", "--no-decorate", &range])
            .await?;
        Self::require_success("log", &output)?;

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|l| l.to_string())
            .collect())
    }

    pub async fn diff_stats(&self, task_id: TaskId, base_branch: &str) -> Result<String> {
        self.diff_against(task_id, base_branch, true).await
    }

    pub async fn diff(&self, task_id: TaskId, base_branch: &str) -> Result<String> {
        self.diff_against(task_id, base_branch, false).await
    }

    async fn diff_against(&self, task_id: TaskId, base_branch: &str, stat_only: bool) -> Result<String> {
        let Some(path) = self.get_path(task_id).await else {
            return Err(KaganError::WorktreeNotFound(task_id.to_string()));
        };
        let base_branch = sanitize_branch_component(base_branch);
        let range = format!("{base_branch}...HEAD");

        let mut args = vec!["diff"];
        if stat_only {
            args.push("--stat");
        }
        args.push(&range);

        let output = self.run_git_in(&path, &args).await?;
        Self::require_success("diff", &output)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Fast-forwards `base_branch` into the task branch. On conflict, aborts
    /// the rebase and returns the conflicting paths.
    pub async fn rebase_onto(&self, task_id: TaskId, base_branch: &str) -> Result<GitOutcome> {
        let Some(path) = self.get_path(task_id).await else {
            return Err(KaganError::WorktreeNotFound(task_id.to_string()));
        };
        let base_branch = sanitize_branch_component(base_branch);

        let fetch = self.run_git_in(&path, &["fetch", "origin", &base_branch]).await;
        if let Ok(output) = &fetch {
            if !output.status.success() {
                debug!("fetch origin failed, proceeding with local base ref");
            }
        }

        let output = self.run_git_in(&path, &["rebase", &base_branch]).await?;
        if output.status.success() {
            return Ok(GitOutcome::Ok {
                message: "rebase clean".to_string(),
            });
        }

        let conflict_files = self.conflicting_paths(&path).await?;
        let abort = self.run_git_in(&path, &["rebase", "--abort"]).await?;
        if !abort.status.success() {
            warn!(%task_id, "rebase --abort itself failed");
        }

        Ok(GitOutcome::Conflict {
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            conflict_files,
        })
    }

    async fn conflicting_paths(&self, worktree: &Path) -> Result<Vec<String>> {
        let output = self
            .run_git_in(worktree, &["diff", "--name-only", "--diff-filter=U"])
            .await?;
        Self::require_success("diff --name-only --diff-filter=U", &output)?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|l| l.to_string())
            .collect())
    }

    /// Merges the task branch into `base_branch`, generating a conventional
    /// commit message from `title` and the commit log. This is the primitive
    /// `MergeCoordinator` calls under its serialization lock.
    pub async fn merge(
        &self,
        task_id: TaskId,
        title: &str,
        base_branch: &str,
        squash: bool,
    ) -> Result<GitOutcome> {
        let Some(worktree) = self.get_path(task_id).await else {
            return Err(KaganError::WorktreeNotFound(task_id.to_string()));
        };
        let base_branch_safe = sanitize_branch_component(base_branch);

        if self.base_has_uncommitted_changes().await? {
            return Err(KaganError::MergePreconditionFailure {
                message: "base working copy has uncommitted changes".to_string(),
            });
        }

        let commits = self.commit_log(task_id, base_branch).await?;
        let message = generate_semantic_commit_message(task_id, title, &commits);

        let branch = self
            .list_task_branches(task_id)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| KaganError::WorktreeNotFound(task_id.to_string()))?;

        let output = self.run_git_in(&self.repo_dir, &["checkout", &base_branch_safe]).await?;
        Self::require_success("checkout", &output)?;

        let merge_args: Vec<&str> = if squash {
            vec!["merge", "--squash", &branch]
        } else {
            vec!["merge", "--no-ff", &branch]
        };
        let output = self.run_git_in(&self.repo_dir, &merge_args).await?;

        if !output.status.success() {
            let conflict_files = self.conflicting_paths(&self.repo_dir).await?;
            let abort = self.run_git_in(&self.repo_dir, &["merge", "--abort"]).await?;
            if !abort.status.success() {
                warn!(%task_id, "merge --abort itself failed");
            }
            return Ok(GitOutcome::Conflict {
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                conflict_files,
            });
        }

        if squash {
            let output = self
                .run_git_in(&self.repo_dir, &["commit", "-m", &message])
                .await?;
            Self::require_success("commit", &output)?;
        }

        let _ = worktree;
        Ok(GitOutcome::Ok { message })
    }
}

fn is_generated_path(path: &str) -> bool {
    GENERATED_FILE_PATTERNS.iter().any(|pattern| {
        if let Some(prefix) = pattern.strip_suffix('/') {
            path.starts_with(prefix)
        } else {
            path == *pattern
        }
    })
}
