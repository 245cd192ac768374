//! Shared integration-test scaffolding: a timeout wrapper (mirroring this
//! codebase's existing test-helper convention), a throwaway git repository
//! fixture, and a stub `AgentDriver` with deterministic canned responses.

use async_trait::async_trait;
use kagan_core::agent::{AgentDriver, AgentUpdate, StopReason};
use kagan_core::error::{KaganError, Result};
use std::collections::VecDeque;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;

pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs `future`, failing the test with a descriptive message instead of
/// hanging the suite if it doesn't finish in time.
pub async fn with_timeout<F, T>(test_name: &str, future: F) -> T
where
    F: Future<Output = T>,
{
    match timeout(DEFAULT_TEST_TIMEOUT, future).await {
        Ok(result) => result,
        Err(_) => panic!("[TEST: {test_name}] timed out after {:?}", DEFAULT_TEST_TIMEOUT),
    }
}

/// True if a `git` binary is reachable on PATH. Tests that need a real repo
/// skip (print and return) instead of failing when it is not.
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// A repo with one commit on `main`, ready to be the `repo_dir` a
/// `WorkspaceManager` creates worktrees against.
pub struct GitFixture {
    pub repo_dir: TempDir,
    pub worktree_root: TempDir,
}

impl GitFixture {
    pub fn new() -> Self {
        let repo_dir = TempDir::new().expect("tempdir");
        let worktree_root = TempDir::new().expect("tempdir");
        let path = repo_dir.path();

        run(path, &["init"]);
        run(path, &["checkout", "-b", "main"]);
        run(path, &["config", "user.email", "test@example.com"]);
        run(path, &["config", "user.name", "Test"]);
        std::fs::write(path.join("README.md"), "hello\n").unwrap();
        run(path, &["add", "."]);
        run(path, &["commit", "-m", "initial commit"]);

        Self { repo_dir, worktree_root }
    }

    pub fn repo_path(&self) -> PathBuf {
        self.repo_dir.path().to_path_buf()
    }

    pub fn worktree_root_path(&self) -> PathBuf {
        self.worktree_root.path().to_path_buf()
    }
}

fn run(dir: &Path, args: &[&str]) -> std::process::Output {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap_or_else(|e| panic!("failed to run git {args:?}: {e}"));
    if !output.status.success() {
        panic!(
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
    output
}

/// An `AgentDriver` double that replays canned responses in order, looping
/// on the last one once exhausted. Optionally writes and commits a file on
/// every prompt so merge has something real to squash.
pub struct StubAgentDriver {
    responses: StdMutex<VecDeque<String>>,
    last_response: StdMutex<String>,
    prompt_count: AtomicUsize,
    stop_calls: AtomicUsize,
    cancel_calls: AtomicUsize,
    working_dir: Mutex<Option<PathBuf>>,
    commit_on_prompt: bool,
    commit_file: String,
    commit_file_contents: String,
    /// When set, `send_prompt` never resolves on its own — it sleeps past
    /// any sane test timeout so a cancellation race in the caller always
    /// wins, modeling scenario 6 (cancellation mid-prompt).
    hang_forever: bool,
}

impl StubAgentDriver {
    pub fn new(responses: Vec<&str>, commit_on_prompt: bool) -> Self {
        Self::with_commit_file(responses, commit_on_prompt, "agent-note.txt", "agent work\n")
    }

    pub fn with_commit_file(responses: Vec<&str>, commit_on_prompt: bool, file_name: &str, contents: &str) -> Self {
        Self {
            responses: StdMutex::new(responses.into_iter().map(String::from).collect()),
            last_response: StdMutex::new(String::new()),
            prompt_count: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            cancel_calls: AtomicUsize::new(0),
            working_dir: Mutex::new(None),
            commit_on_prompt,
            commit_file: file_name.to_string(),
            commit_file_contents: contents.to_string(),
            hang_forever: false,
        }
    }

    pub fn hanging() -> Self {
        Self {
            responses: StdMutex::new(VecDeque::new()),
            last_response: StdMutex::new(String::new()),
            prompt_count: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            cancel_calls: AtomicUsize::new(0),
            working_dir: Mutex::new(None),
            commit_on_prompt: false,
            commit_file: String::new(),
            commit_file_contents: String::new(),
            hang_forever: true,
        }
    }

    pub fn prompt_count(&self) -> usize {
        self.prompt_count.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentDriver for StubAgentDriver {
    async fn start(&self, working_dir: &Path, _model_override: Option<&str>, _read_only: bool) -> Result<()> {
        *self.working_dir.lock().await = Some(working_dir.to_path_buf());
        Ok(())
    }

    async fn wait_ready(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    async fn send_prompt(&self, _prompt: &str) -> Result<StopReason> {
        if self.hang_forever {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            return Err(KaganError::Cancelled);
        }

        self.prompt_count.fetch_add(1, Ordering::SeqCst);

        if self.commit_on_prompt {
            if let Some(dir) = self.working_dir.lock().await.clone() {
                std::fs::write(dir.join(&self.commit_file), &self.commit_file_contents).unwrap();
                run(&dir, &["add", "."]);
                run(&dir, &["commit", "-m", "agent iteration"]);
            }
        }

        let mut responses = self.responses.lock().unwrap();
        let response = if responses.len() > 1 {
            responses.pop_front().unwrap()
        } else {
            responses.front().cloned().unwrap_or_default()
        };
        *self.last_response.lock().unwrap() = response;
        Ok(StopReason::EndTurn)
    }

    async fn cancel(&self) -> Result<()> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn response_text(&self) -> String {
        self.last_response.lock().unwrap().clone()
    }

    async fn subscribe(&self) -> mpsc::UnboundedReceiver<AgentUpdate> {
        let (_tx, rx) = mpsc::unbounded_channel();
        rx
    }
}

/// Polls an async predicate every 25ms for up to 5s, for assertions on
/// state the worker loop updates on its own schedule.
pub async fn poll_until<F, Fut>(mut predicate: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if predicate().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    false
}
