//! The single thread of truth for agent lifecycle, implemented as a
//! one-consumer event loop. Every mutation of `running` is routed through
//! the worker task; nothing else is allowed to touch it directly.

pub mod event_queue;

use crate::agent::{AgentDriver, ProcessAgentDriver};
use crate::constants::{CAPACITY_BACKOFF_DELAY_MS, FALLBACK_AGENT_COMMAND};
use crate::error::KaganError;
use crate::merge::{MergeCoordinator, MergeOutcome};
use crate::models::{RunningTaskState, Task, TaskId, TaskStatus, TaskType};
use crate::review::ReviewEngine;
use crate::signal::{parse_signal, ParseContext, Signal};
use crate::store::{iteration_banner, TaskPatch, TaskStore};
use crate::workspace::WorkspaceManager;
use event_queue::{EventQueue, EventQueueReceiver, StatusChangeEvent};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Builds the `AgentDriver` a worker or review run spawns, given the
/// resolved command/args for that agent identity plus its auto-approve
/// policy and permission-request timeout. Indirected behind a factory
/// (rather than constructing `ProcessAgentDriver` inline) so tests can hand
/// the Scheduler a stub driver without a real subprocess.
pub type DriverFactory = Arc<dyn Fn(String, Vec<String>, usize, bool, Duration) -> Arc<dyn AgentDriver> + Send + Sync>;

/// The default factory used in production: a real subprocess speaking the
/// JSON-RPC driver protocol.
pub fn process_driver_factory() -> DriverFactory {
    Arc::new(|command, args, replay_capacity, auto_approve, permission_timeout| {
        Arc::new(ProcessAgentDriver::new(command, args, replay_capacity, auto_approve, permission_timeout))
            as Arc<dyn AgentDriver>
    })
}

/// The subset of `Config` the Scheduler needs, kept narrow so tests can
/// construct one without the full environment-driven `Config`.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub auto_start: bool,
    pub auto_merge: bool,
    pub auto_approve: bool,
    pub max_concurrent_agents: usize,
    pub max_iterations: u32,
    pub iteration_delay: Duration,
    pub agent_ready_timeout: Duration,
    pub default_worker_agent: String,
    pub default_review_agent: String,
    pub default_base_branch: String,
    pub message_bus_replay_capacity: usize,
    pub scratchpad_max_bytes: usize,
    /// How long a forwarded (non-auto-approved) permission request waits for
    /// an answer before falling back to a reject-class option.
    pub permission_request_timeout: Duration,
    /// Agent identity -> model override, e.g. `claude` -> `claude-opus`.
    pub default_models: HashMap<String, String>,
    /// Agent identity -> (command, args). Resolved once at startup from
    /// operator config; `FALLBACK_AGENT_COMMAND` covers an identity with no
    /// entry here.
    pub agent_commands: HashMap<String, (String, Vec<String>)>,
}

impl SchedulerConfig {
    fn resolve_command(&self, identity: &str) -> (String, Vec<String>) {
        self.agent_commands
            .get(identity)
            .cloned()
            .unwrap_or_else(|| (FALLBACK_AGENT_COMMAND.to_string(), Vec::new()))
    }

    fn model_override_for(&self, identity: &str) -> Option<&str> {
        self.default_models.get(&identity.to_lowercase()).map(|s| s.as_str())
    }
}

pub struct Scheduler {
    store: Arc<dyn TaskStore>,
    workspace: Arc<WorkspaceManager>,
    review_engine: Arc<ReviewEngine>,
    merge_coordinator: Arc<MergeCoordinator>,
    config: SchedulerConfig,
    running: Mutex<HashMap<TaskId, Arc<Mutex<RunningTaskState>>>>,
    queue: EventQueue,
    receiver: Mutex<Option<EventQueueReceiver>>,
    shutdown_token: CancellationToken,
    started: Mutex<bool>,
    driver_factory: DriverFactory,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn TaskStore>,
        workspace: Arc<WorkspaceManager>,
        review_engine: Arc<ReviewEngine>,
        merge_coordinator: Arc<MergeCoordinator>,
        config: SchedulerConfig,
        event_queue_capacity: usize,
    ) -> Arc<Self> {
        Self::with_driver_factory(
            store,
            workspace,
            review_engine,
            merge_coordinator,
            config,
            event_queue_capacity,
            process_driver_factory(),
        )
    }

    /// As `new`, but with the agent-subprocess construction indirected
    /// behind `driver_factory` — the seam integration tests use to hand the
    /// Scheduler a stub driver instead of spawning a real coding agent.
    pub fn with_driver_factory(
        store: Arc<dyn TaskStore>,
        workspace: Arc<WorkspaceManager>,
        review_engine: Arc<ReviewEngine>,
        merge_coordinator: Arc<MergeCoordinator>,
        config: SchedulerConfig,
        event_queue_capacity: usize,
        driver_factory: DriverFactory,
    ) -> Arc<Self> {
        let (queue, receiver) = EventQueue::new(event_queue_capacity);
        Arc::new(Self {
            store,
            workspace,
            review_engine,
            merge_coordinator,
            config,
            running: Mutex::new(HashMap::new()),
            queue,
            receiver: Mutex::new(Some(receiver)),
            shutdown_token: CancellationToken::new(),
            started: Mutex::new(false),
            driver_factory,
        })
    }

    /// Idempotent: launches the worker loop on first call, no-ops after.
    pub async fn start(self: &Arc<Self>) {
        let mut started = self.started.lock().await;
        if *started {
            return;
        }
        *started = true;

        let receiver = self
            .receiver
            .lock()
            .await
            .take()
            .expect("receiver taken exactly once at start");

        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.worker_loop(receiver).await });
        info!("scheduler worker started");
    }

    /// On startup, if `auto_start` is enabled, re-adopt every IN_PROGRESS
    /// AUTO task by enqueueing a synthetic event for it.
    pub async fn initialize_existing(&self) {
        if !self.config.auto_start {
            return;
        }
        let in_progress = self.store.list_by_status(TaskStatus::InProgress).await;
        for task in in_progress {
            if task.task_type != TaskType::Auto {
                continue;
            }
            self.queue
                .push(StatusChangeEvent {
                    task_id: task.id,
                    old_status: None,
                    new_status: Some(TaskStatus::InProgress),
                })
                .await;
        }
    }

    /// Thread-safe enqueue; called by the TaskStore's notification mechanism.
    pub async fn handle_status_change(&self, task_id: TaskId, old: Option<TaskStatus>, new: Option<TaskStatus>) {
        self.queue
            .push(StatusChangeEvent {
                task_id,
                old_status: old,
                new_status: new,
            })
            .await;
    }

    /// Enqueues a synthetic IN_PROGRESS -> BACKLOG transition and reports
    /// whether the task was running at the time of the call.
    pub async fn stop_task(&self, task_id: TaskId) -> bool {
        let was_running = self.running.lock().await.contains_key(&task_id);
        self.queue
            .push(StatusChangeEvent {
                task_id,
                old_status: Some(TaskStatus::InProgress),
                new_status: Some(TaskStatus::Backlog),
            })
            .await;
        was_running
    }

    /// Manual override: rejected for non-AUTO tasks.
    pub async fn spawn_for(&self, task: &Task) -> Result<(), KaganError> {
        if task.task_type != TaskType::Auto {
            return Err(KaganError::Validation(
                "cannot manually spawn a non-AUTO task".to_string(),
            ));
        }
        self.queue
            .push(StatusChangeEvent {
                task_id: task.id,
                old_status: None,
                new_status: Some(TaskStatus::InProgress),
            })
            .await;
        Ok(())
    }

    /// Cancels the worker and every running agent, then drains.
    pub async fn shutdown(&self) {
        self.shutdown_token.cancel();
        let running = self.running.lock().await;
        for (task_id, state) in running.iter() {
            let state = state.lock().await;
            state.cancel.cancel();
            if let Some(agent) = &state.agent {
                if let Err(e) = agent.stop().await {
                    warn!(%task_id, error = %e, "failed to stop agent during shutdown");
                }
            }
        }
    }

    async fn worker_loop(self: Arc<Self>, mut receiver: EventQueueReceiver) {
        loop {
            tokio::select! {
                _ = self.shutdown_token.cancelled() => {
                    info!("scheduler worker cancelled, stopping");
                    break;
                }
                event = receiver.recv() => {
                    match event {
                        Some(event) => self.process_event(event).await,
                        None => break,
                    }
                }
            }
        }
    }

    async fn process_event(self: &Arc<Self>, event: StatusChangeEvent) {
        let StatusChangeEvent {
            task_id,
            old_status,
            new_status,
        } = event;

        let Some(new_status) = new_status else {
            self.stop_if_running(task_id).await;
            return;
        };

        let task = match self.store.get(task_id).await {
            Some(task) if task.task_type == TaskType::Auto => task,
            _ => {
                self.stop_if_running(task_id).await;
                return;
            }
        };

        if new_status == TaskStatus::InProgress {
            self.ensure_running(task).await;
        } else if old_status == Some(TaskStatus::InProgress) {
            self.stop_if_running(task_id).await;
        }
    }

    async fn ensure_running(self: &Arc<Self>, task: Task) {
        {
            let running = self.running.lock().await;
            if running.contains_key(&task.id) {
                debug!(task_id = %task.id, "already running, ignoring");
                return;
            }
            if running.len() >= self.config.max_concurrent_agents {
                drop(running);
                let queue = self.queue.clone();
                let task_id = task.id;
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(CAPACITY_BACKOFF_DELAY_MS)).await;
                    queue
                        .push(StatusChangeEvent {
                            task_id,
                            old_status: None,
                            new_status: Some(TaskStatus::InProgress),
                        })
                        .await;
                });
                return;
            }
        }

        let cancel = self.shutdown_token.child_token();
        let state = Arc::new(Mutex::new(RunningTaskState::new(cancel)));
        self.running.lock().await.insert(task.id, state.clone());

        let scheduler = self.clone();
        let task_id = task.id;
        tokio::spawn(async move {
            scheduler.clone().run_task_loop(task, state).await;
            scheduler.running.lock().await.remove(&task_id);
        });
    }

    async fn stop_if_running(&self, task_id: TaskId) {
        let state = self.running.lock().await.remove(&task_id);
        if let Some(state) = state {
            let state = state.lock().await;
            if let Some(agent) = &state.agent {
                if let Err(e) = agent.stop().await {
                    warn!(%task_id, error = %e, "agent failed to stop cleanly");
                }
            }
            state.cancel.cancel();
        }
    }

    fn resolve_agent_identity(&self, task: &Task) -> String {
        task.agent_backend
            .clone()
            .unwrap_or_else(|| self.config.default_worker_agent.clone())
    }

    async fn run_task_loop(self: Arc<Self>, task: Task, state: Arc<Mutex<RunningTaskState>>) {
        let task_id = task.id;
        if let Err(e) = self
            .store
            .update(
                task_id,
                TaskPatch {
                    checks_passed: Some(false),
                    review_summary: Some(None),
                    merge_failed: Some(false),
                    merge_error: Some(None),
                    ..Default::default()
                },
            )
            .await
        {
            error!(%task_id, error = %e, "failed to clear review/merge state");
            return;
        }

        let base_branch = task
            .base_branch
            .clone()
            .unwrap_or_else(|| self.config.default_base_branch.clone());

        let worktree = match self.workspace.create(task_id, &task.title, &base_branch).await {
            Ok(path) => path,
            Err(e) => {
                error!(%task_id, error = %e, "failed to create worktree");
                self.bounce_to_backlog(task_id, &format!("--- BLOCKED --- reason: {e}")).await;
                return;
            }
        };

        let identity = self.resolve_agent_identity(&task);
        let (command, args) = self.config.resolve_command(&identity);

        let cancel_token = state.lock().await.cancel.clone();

        for iteration in 1..=self.config.max_iterations {
            if cancel_token.is_cancelled() {
                return;
            }
            if !self.running.lock().await.contains_key(&task_id) {
                return;
            }

            {
                let mut guard = state.lock().await;
                guard.session_iteration = iteration;
            }

            if let Err(e) = self.store.increment_total_iterations(task_id).await {
                error!(%task_id, error = %e, "failed to persist iteration count");
                return;
            }

            let agent_is_live = state.lock().await.agent.is_some();
            if !agent_is_live {
                let driver = (self.driver_factory)(
                    command.clone(),
                    args.clone(),
                    self.config.message_bus_replay_capacity,
                    self.config.auto_approve,
                    self.config.permission_request_timeout,
                );

                let model_override = self.config.model_override_for(&identity);
                if let Err(e) = driver.start(&worktree, model_override, false).await {
                    self.handle_blocked(task_id, &format!("Agent failed to start: {e}")).await;
                    return;
                }

                if let Err(e) = tokio::select! {
                    result = driver.wait_ready(self.config.agent_ready_timeout) => result,
                    _ = cancel_token.cancelled() => { let _ = driver.stop().await; return; }
                } {
                    let _ = driver.stop().await;
                    self.handle_blocked(task_id, &format!("Agent failed to start: {e}")).await;
                    return;
                }

                state.lock().await.agent = Some(driver);
            }

            let agent = state.lock().await.agent.clone().expect("just set above");

            let scratchpad = self.store.get_scratchpad(task_id).await.unwrap_or_default();
            let prompt = build_iteration_prompt(&task, iteration, self.config.max_iterations, &scratchpad);

            let send_result = tokio::select! {
                result = agent.send_prompt(&prompt) => result,
                _ = cancel_token.cancelled() => { let _ = agent.stop().await; return; }
            };

            if let Err(e) = send_result {
                let _ = agent.stop().await;
                self.handle_blocked(task_id, &format!("agent error: {e}")).await;
                return;
            }

            let response = agent.response_text().await;
            let signal = parse_signal(&response, ParseContext::Iteration);
            let _ = self
                .store
                .update_scratchpad(
                    task_id,
                    &iteration_banner(iteration, &response),
                    self.config.scratchpad_max_bytes,
                )
                .await;

            match signal {
                Signal::Complete => {
                    self.handle_complete(task_id, &task, &base_branch).await;
                    return;
                }
                Signal::Blocked { reason } => {
                    let _ = agent.stop().await;
                    self.handle_blocked(task_id, &reason).await;
                    return;
                }
                Signal::Continue => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.iteration_delay) => {}
                        _ = cancel_token.cancelled() => { let _ = agent.stop().await; return; }
                    }
                }
                Signal::Approve { .. } | Signal::Reject { .. } => {
                    // Iteration context never emits these; treat as continue.
                }
            }
        }

        self.handle_max_iterations(task_id).await;
    }

    async fn handle_complete(&self, task_id: TaskId, task: &Task, base_branch: &str) {
        let agent_command = self.config.resolve_command(&self.config.default_review_agent);
        let review_engine = self.review_engine.clone();
        let replay_capacity = self.config.message_bus_replay_capacity;
        let permission_timeout = self.config.permission_request_timeout;
        let driver_factory = self.driver_factory.clone();

        let outcome = review_engine
            .review(task, base_branch, move || {
                // Review agents auto-approve their own (read-only) permission
                // requests regardless of the worker-agent policy.
                driver_factory(agent_command.0, agent_command.1, replay_capacity, true, permission_timeout)
            })
            .await;

        if let Err(e) = self
            .store
            .update(
                task_id,
                TaskPatch {
                    status: Some(TaskStatus::Review),
                    checks_passed: Some(outcome.approved),
                    review_summary: Some(Some(outcome.detail.clone())),
                    ..Default::default()
                },
            )
            .await
        {
            error!(%task_id, error = %e, "failed to persist review outcome");
            return;
        }

        if self.config.auto_merge && outcome.approved {
            self.try_auto_merge(task_id, task, base_branch).await;
        }
    }

    async fn try_auto_merge(&self, task_id: TaskId, task: &Task, base_branch: &str) {
        match self.merge_coordinator.merge_task(task, base_branch, true).await {
            Ok(MergeOutcome::Merged { .. }) => {
                if let Err(e) = self.workspace.delete(task_id, true).await {
                    warn!(%task_id, error = %e, "merged but failed to delete worktree");
                }
                if let Err(e) = self.store.move_status(task_id, TaskStatus::Done).await {
                    error!(%task_id, error = %e, "failed to mark merged task done");
                }
            }
            Ok(MergeOutcome::RebaseConflict { conflict_files }) => {
                info!(%task_id, ?conflict_files, "rebase conflict, bouncing back to in-progress");
                let description = format!(
                    "{}\n\nPlease resolve rebase conflicts in: {}",
                    task.description,
                    conflict_files.join(", ")
                );
                if let Err(e) = self
                    .store
                    .update(
                        task_id,
                        TaskPatch {
                            status: Some(TaskStatus::InProgress),
                            description: Some(description),
                            ..Default::default()
                        },
                    )
                    .await
                {
                    error!(%task_id, error = %e, "failed to bounce task back to in-progress");
                }
            }
            Ok(MergeOutcome::Failed { message }) => {
                warn!(%task_id, message, "merge failed");
                let _ = self
                    .store
                    .update(
                        task_id,
                        TaskPatch {
                            merge_failed: Some(true),
                            merge_error: Some(Some(message)),
                            ..Default::default()
                        },
                    )
                    .await;
            }
            Err(e) => {
                warn!(%task_id, error = %e, "merge coordinator error");
                let _ = self
                    .store
                    .update(
                        task_id,
                        TaskPatch {
                            merge_failed: Some(true),
                            merge_error: Some(Some(e.to_string())),
                            ..Default::default()
                        },
                    )
                    .await;
            }
        }
    }

    async fn handle_blocked(&self, task_id: TaskId, reason: &str) {
        self.bounce_to_backlog(task_id, &format!("--- BLOCKED --- reason: {reason}")).await;
    }

    async fn handle_max_iterations(&self, task_id: TaskId) {
        self.bounce_to_backlog(task_id, "--- MAX ITERATIONS ---").await;
    }

    async fn bounce_to_backlog(&self, task_id: TaskId, banner: &str) {
        let _ = self
            .store
            .update_scratchpad(task_id, &format!("\n\n{banner}"), usize::MAX)
            .await;
        if let Err(e) = self.store.move_status(task_id, TaskStatus::Backlog).await {
            error!(%task_id, error = %e, "failed to move task back to backlog");
        }
    }
}

/// Builds the prompt sent for one iteration: task context, prior scratchpad,
/// and the iteration counter so the agent knows its budget.
fn build_iteration_prompt(task: &Task, iteration: u32, max_iterations: u32, scratchpad: &str) -> String {
    let progress = if scratchpad.is_empty() {
        "(No previous progress - this is iteration 1)".to_string()
    } else {
        scratchpad.to_string()
    };

    format!(
        "Iteration {iteration} of {max_iterations}.\n\n\
         Task: {}\n\
         Description:\n{}\n\n\
         Progress so far:\n{progress}\n\n\
         When the task is fully done, respond with <complete/>. If you are blocked, respond with \
         <blocked reason=\"...\"/>. Otherwise continue working.",
        task.title, task.description,
    )
}
