use kagan_core::config::Config;
use kagan_core::constants::EVENT_QUEUE_CAPACITY;
use kagan_core::merge::MergeCoordinator;
use kagan_core::review::ReviewEngine;
use kagan_core::scheduler::{Scheduler, SchedulerConfig};
use kagan_core::store::InMemoryTaskStore;
use kagan_core::workspace::WorkspaceManager;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("starting kagan-core task-execution service");

    let config = Config::load()?;

    let workspace = Arc::new(WorkspaceManager::new(
        PathBuf::from(&config.workspace_root),
        PathBuf::from(&config.repo_dir),
    ));
    let review_engine = Arc::new(ReviewEngine::new(workspace.clone(), config.agent_ready_timeout()));
    let merge_coordinator = Arc::new(MergeCoordinator::new(workspace.clone(), config.auto_retry_on_merge_conflict));
    let store: Arc<dyn kagan_core::store::TaskStore> = Arc::new(InMemoryTaskStore::new());
    let store_status_changes = store.subscribe_status_changes();

    let scheduler_config = SchedulerConfig {
        auto_start: config.auto_start,
        auto_merge: config.auto_merge,
        auto_approve: config.auto_approve,
        max_concurrent_agents: config.max_concurrent_agents,
        max_iterations: config.max_iterations,
        iteration_delay: config.iteration_delay(),
        agent_ready_timeout: config.agent_ready_timeout(),
        default_worker_agent: config.default_worker_agent.clone(),
        default_review_agent: config.default_review_agent.clone(),
        default_base_branch: config.default_base_branch.clone(),
        message_bus_replay_capacity: config.message_bus_replay_capacity,
        scratchpad_max_bytes: config.scratchpad_max_bytes,
        permission_request_timeout: config.permission_request_timeout(),
        default_models: config.default_models.clone(),
        agent_commands: HashMap::new(),
    };

    let scheduler = Scheduler::new(
        store,
        workspace,
        review_engine,
        merge_coordinator,
        scheduler_config,
        EVENT_QUEUE_CAPACITY,
    );

    scheduler.initialize_existing().await;
    scheduler.start().await;

    // Bridges TaskStore's status-change broadcast into the Scheduler's event
    // queue, per the Scheduler's documented "called by TaskStore's
    // notification mechanism" contract for handle_status_change.
    {
        let scheduler = scheduler.clone();
        let mut status_changes = store_status_changes;
        tokio::spawn(async move {
            while let Ok((task_id, old_status, new_status)) = status_changes.recv().await {
                scheduler.handle_status_change(task_id, old_status, new_status).await;
            }
        });
    }

    info!("kagan-core running, press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    scheduler.shutdown().await;

    Ok(())
}
