//! End-to-end Scheduler tests, driving the real worker loop against a
//! throwaway git repository and a stub `AgentDriver`. Mirrors this
//! codebase's test-helper timeout convention so a stuck worker loop fails
//! fast instead of hanging the suite.

mod common;

use common::{git_available, poll_until, with_timeout, GitFixture, StubAgentDriver};
use kagan_core::agent::AgentDriver;
use kagan_core::merge::MergeCoordinator;
use kagan_core::models::{Priority, Task, TaskStatus};
use kagan_core::review::ReviewEngine;
use kagan_core::scheduler::{DriverFactory, Scheduler, SchedulerConfig};
use kagan_core::store::{InMemoryTaskStore, TaskStore};
use kagan_core::workspace::WorkspaceManager;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const WORKER_COMMAND: &str = "stub-worker";
const REVIEW_COMMAND: &str = "stub-reviewer";

fn base_config(max_concurrent_agents: usize, max_iterations: u32) -> SchedulerConfig {
    let mut agent_commands = HashMap::new();
    agent_commands.insert("worker".to_string(), (WORKER_COMMAND.to_string(), Vec::new()));
    agent_commands.insert("reviewer".to_string(), (REVIEW_COMMAND.to_string(), Vec::new()));

    SchedulerConfig {
        auto_start: true,
        auto_merge: true,
        auto_approve: false,
        max_concurrent_agents,
        max_iterations,
        iteration_delay: Duration::from_millis(5),
        agent_ready_timeout: Duration::from_secs(5),
        default_worker_agent: "worker".to_string(),
        default_review_agent: "reviewer".to_string(),
        default_base_branch: "main".to_string(),
        message_bus_replay_capacity: 50,
        scratchpad_max_bytes: 16384,
        permission_request_timeout: Duration::from_secs(5),
        default_models: HashMap::new(),
        agent_commands,
    }
}

/// Wires a Scheduler against a real git fixture and a real `InMemoryTaskStore`,
/// bridging the store's status-change broadcast into the Scheduler exactly as
/// `main.rs` does. `resolve` maps a resolved command string back to the stub
/// driver that command identity should spawn.
fn build_scheduler(
    fixture: &GitFixture,
    config: SchedulerConfig,
    resolve: impl Fn(&str) -> Arc<dyn AgentDriver> + Send + Sync + 'static,
) -> (Arc<Scheduler>, Arc<dyn TaskStore>) {
    let workspace = Arc::new(WorkspaceManager::new(fixture.worktree_root_path(), fixture.repo_path()));
    let review_engine = Arc::new(ReviewEngine::new(workspace.clone(), config.agent_ready_timeout));
    let merge_coordinator = Arc::new(MergeCoordinator::new(workspace.clone(), true));
    let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    let status_changes = store.subscribe_status_changes();

    let driver_factory: DriverFactory =
        Arc::new(move |command, _args, _cap, _auto_approve, _permission_timeout| resolve(&command));

    let scheduler = Scheduler::with_driver_factory(
        store.clone(),
        workspace,
        review_engine,
        merge_coordinator,
        config,
        64,
        driver_factory,
    );

    let bridge_scheduler = scheduler.clone();
    let mut status_changes = status_changes;
    tokio::spawn(async move {
        while let Ok((task_id, old, new)) = status_changes.recv().await {
            bridge_scheduler.handle_status_change(task_id, old, new).await;
        }
    });

    (scheduler, store)
}

async fn wait_for_status(store: &Arc<dyn TaskStore>, task_id: kagan_core::models::TaskId, status: TaskStatus) -> bool {
    let store = store.clone();
    poll_until(|| {
        let store = store.clone();
        async move { matches!(store.get(task_id).await.map(|t| t.status), Some(s) if s == status) }
    })
    .await
}

#[tokio::test]
async fn happy_path_complete_then_merge() {
    if !git_available() {
        eprintln!("git not on PATH, skipping");
        return;
    }
    with_timeout("happy_path_complete_then_merge", async {
        let fixture = GitFixture::new();
        let worker = Arc::new(StubAgentDriver::new(vec!["done. <complete/>"], true));
        let review = Arc::new(StubAgentDriver::new(vec![r#"<approve summary="looks good"/>"#], false));

        let worker_for_resolve = worker.clone();
        let review_for_resolve = review.clone();
        let (scheduler, store) = build_scheduler(&fixture, base_config(3, 5), move |command| match command {
            WORKER_COMMAND => worker_for_resolve.clone() as Arc<dyn AgentDriver>,
            REVIEW_COMMAND => review_for_resolve.clone() as Arc<dyn AgentDriver>,
            other => panic!("unexpected driver command: {other}"),
        });
        scheduler.start().await;

        let task = Task::new("Add X".to_string(), "do the thing".to_string(), Priority::Medium);
        let task_id = task.id;
        store.insert(task).await.unwrap();
        store.move_status(task_id, TaskStatus::InProgress).await.unwrap();

        assert!(wait_for_status(&store, task_id, TaskStatus::Done).await, "task should reach DONE");

        let task = store.get(task_id).await.unwrap();
        assert!(task.checks_passed);
        assert_eq!(task.review_summary.as_deref(), Some("looks good"));
        assert_eq!(task.total_iterations, 1);
        assert_eq!(worker.stop_calls(), 1);
    })
    .await;
}

#[tokio::test]
async fn blocked_on_first_iteration() {
    if !git_available() {
        eprintln!("git not on PATH, skipping");
        return;
    }
    with_timeout("blocked_on_first_iteration", async {
        let fixture = GitFixture::new();
        let worker = Arc::new(StubAgentDriver::new(
            vec![r#"<blocked reason="missing api key"/>"#],
            false,
        ));
        let worker_for_resolve = worker.clone();
        let (scheduler, store) = build_scheduler(&fixture, base_config(3, 5), move |command| match command {
            WORKER_COMMAND => worker_for_resolve.clone() as Arc<dyn AgentDriver>,
            other => panic!("unexpected driver command: {other}"),
        });
        scheduler.start().await;

        let task = Task::new("Add Y".to_string(), "do the other thing".to_string(), Priority::Medium);
        let task_id = task.id;
        store.insert(task).await.unwrap();
        store.move_status(task_id, TaskStatus::InProgress).await.unwrap();

        assert!(wait_for_status(&store, task_id, TaskStatus::Backlog).await, "task should bounce to BACKLOG");

        let task = store.get(task_id).await.unwrap();
        assert!(task.scratchpad.contains("--- BLOCKED --- reason: missing api key"));
        assert_eq!(task.total_iterations, 1);
    })
    .await;
}

#[tokio::test]
async fn max_iterations_without_signal() {
    if !git_available() {
        eprintln!("git not on PATH, skipping");
        return;
    }
    with_timeout("max_iterations_without_signal", async {
        let fixture = GitFixture::new();
        let worker = Arc::new(StubAgentDriver::new(vec!["still working on it, no signal yet"], false));
        let worker_for_resolve = worker.clone();
        let (scheduler, store) = build_scheduler(&fixture, base_config(3, 3), move |command| match command {
            WORKER_COMMAND => worker_for_resolve.clone() as Arc<dyn AgentDriver>,
            other => panic!("unexpected driver command: {other}"),
        });
        scheduler.start().await;

        let task = Task::new("Add Z".to_string(), "grinding away".to_string(), Priority::Low);
        let task_id = task.id;
        store.insert(task).await.unwrap();
        store.move_status(task_id, TaskStatus::InProgress).await.unwrap();

        assert!(wait_for_status(&store, task_id, TaskStatus::Backlog).await, "task should bounce to BACKLOG");

        let task = store.get(task_id).await.unwrap();
        assert!(task.scratchpad.contains("--- MAX ITERATIONS ---"));
        assert_eq!(task.total_iterations, 3);
        assert_eq!(worker.prompt_count(), 3);
    })
    .await;
}

#[tokio::test]
async fn capacity_cap_defers_excess_tasks() {
    if !git_available() {
        eprintln!("git not on PATH, skipping");
        return;
    }
    with_timeout("capacity_cap_defers_excess_tasks", async {
        let fixture = GitFixture::new();
        let worker = Arc::new(StubAgentDriver::new(vec!["done. <complete/>"], true));
        let review = Arc::new(StubAgentDriver::new(vec![r#"<approve summary="ok"/>"#], false));
        let worker_for_resolve = worker.clone();
        let review_for_resolve = review.clone();
        let (scheduler, store) = build_scheduler(&fixture, base_config(2, 5), move |command| match command {
            WORKER_COMMAND => worker_for_resolve.clone() as Arc<dyn AgentDriver>,
            REVIEW_COMMAND => review_for_resolve.clone() as Arc<dyn AgentDriver>,
            other => panic!("unexpected driver command: {other}"),
        });
        scheduler.start().await;

        let mut task_ids = Vec::new();
        for title in ["T1", "T2", "T3"] {
            let task = Task::new(title.to_string(), "work".to_string(), Priority::Medium);
            task_ids.push(task.id);
            store.insert(task).await.unwrap();
        }
        for task_id in &task_ids {
            store.move_status(*task_id, TaskStatus::InProgress).await.unwrap();
        }

        for task_id in &task_ids {
            assert!(
                wait_for_status(&store, *task_id, TaskStatus::Done).await,
                "every task should eventually complete"
            );
        }
    })
    .await;
}

#[tokio::test]
async fn rebase_conflict_bounces_back_to_in_progress() {
    if !git_available() {
        eprintln!("git not on PATH, skipping");
        return;
    }
    with_timeout("rebase_conflict_bounces_back_to_in_progress", async {
        let fixture = GitFixture::new();
        // The worker's commit and main's divergent commit both touch
        // README.md, guaranteeing the rebase in MergeCoordinator conflicts.
        let worker = Arc::new(StubAgentDriver::with_commit_file(
            vec!["done. <complete/>"],
            true,
            "README.md",
            "the agent's version\n",
        ));
        let review = Arc::new(StubAgentDriver::new(vec![r#"<approve summary="ok"/>"#], false));

        let worker_for_resolve = worker.clone();
        let review_for_resolve = review.clone();
        let (scheduler, store) = build_scheduler(&fixture, base_config(3, 5), move |command| match command {
            WORKER_COMMAND => worker_for_resolve.clone() as Arc<dyn AgentDriver>,
            REVIEW_COMMAND => review_for_resolve.clone() as Arc<dyn AgentDriver>,
            other => panic!("unexpected driver command: {other}"),
        });
        scheduler.start().await;

        let task = Task::new(
            "Add conflicting change".to_string(),
            "touch README.md".to_string(),
            Priority::Medium,
        );
        let task_id = task.id;
        store.insert(task).await.unwrap();

        std::fs::write(fixture.repo_path().join("README.md"), "main moved on without you\n").unwrap();
        std::process::Command::new("git")
            .args(["add", "."])
            .current_dir(fixture.repo_path())
            .status()
            .unwrap();
        std::process::Command::new("git")
            .args(["commit", "-m", "advance main"])
            .current_dir(fixture.repo_path())
            .status()
            .unwrap();

        store.move_status(task_id, TaskStatus::InProgress).await.unwrap();

        let bounced = poll_until(|| {
            let store = store.clone();
            async move {
                store
                    .get(task_id)
                    .await
                    .map(|t| t.status == TaskStatus::InProgress && t.description.contains("README.md"))
                    .unwrap_or(false)
            }
        })
        .await;
        assert!(bounced, "task should bounce back to IN_PROGRESS with conflict files noted");
    })
    .await;
}

#[tokio::test]
async fn cancellation_mid_prompt_stops_the_agent() {
    if !git_available() {
        eprintln!("git not on PATH, skipping");
        return;
    }
    with_timeout("cancellation_mid_prompt_stops_the_agent", async {
        let fixture = GitFixture::new();
        let worker = Arc::new(StubAgentDriver::hanging());
        let worker_for_resolve = worker.clone();
        let (scheduler, store) = build_scheduler(&fixture, base_config(3, 5), move |command| match command {
            WORKER_COMMAND => worker_for_resolve.clone() as Arc<dyn AgentDriver>,
            other => panic!("unexpected driver command: {other}"),
        });
        scheduler.start().await;

        let task = Task::new("Add W".to_string(), "slow work".to_string(), Priority::Medium);
        let task_id = task.id;
        store.insert(task).await.unwrap();
        store.move_status(task_id, TaskStatus::InProgress).await.unwrap();

        // Give the worker loop time to start the agent and land inside the
        // hanging `send_prompt` call before cancelling.
        tokio::time::sleep(Duration::from_millis(150)).await;
        store.move_status(task_id, TaskStatus::Backlog).await.unwrap();

        assert!(
            wait_for_status(&store, task_id, TaskStatus::Backlog).await,
            "task should settle in BACKLOG"
        );
        assert!(
            poll_until(|| async { worker.stop_calls() >= 1 }).await,
            "agent should be stopped on cancellation"
        );
    })
    .await;
}

#[tokio::test]
async fn deleting_a_running_task_stops_its_agent() {
    if !git_available() {
        eprintln!("git not on PATH, skipping");
        return;
    }
    with_timeout("deleting_a_running_task_stops_its_agent", async {
        let fixture = GitFixture::new();
        let worker = Arc::new(StubAgentDriver::hanging());
        let worker_for_resolve = worker.clone();
        let (scheduler, store) = build_scheduler(&fixture, base_config(3, 5), move |command| match command {
            WORKER_COMMAND => worker_for_resolve.clone() as Arc<dyn AgentDriver>,
            other => panic!("unexpected driver command: {other}"),
        });
        scheduler.start().await;

        let task = Task::new("Add V".to_string(), "slow work".to_string(), Priority::Medium);
        let task_id = task.id;
        store.insert(task).await.unwrap();
        store.move_status(task_id, TaskStatus::InProgress).await.unwrap();

        // Give the worker loop time to start the agent and land inside the
        // hanging `send_prompt` call before deleting.
        tokio::time::sleep(Duration::from_millis(150)).await;
        store.delete(task_id).await.unwrap();

        assert!(
            poll_until(|| async { worker.stop_calls() >= 1 }).await,
            "agent should be stopped when its task is deleted"
        );
        assert!(store.get(task_id).await.is_none());
    })
    .await;
}
