//! Environment-driven configuration, loaded eagerly at startup with
//! descriptive errors — the same fail-fast-with-remediation-hint posture
//! this codebase uses everywhere else config is loaded.

use crate::error::{KaganError, Result};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub auto_start: bool,
    pub auto_merge: bool,
    pub auto_approve: bool,
    pub auto_retry_on_merge_conflict: bool,
    pub max_concurrent_agents: usize,
    pub max_iterations: u32,
    pub iteration_delay_seconds: f64,
    pub default_worker_agent: String,
    pub default_review_agent: String,
    pub default_base_branch: String,
    pub default_models: HashMap<String, String>,
    pub workspace_root: String,
    pub repo_dir: String,
    pub agent_ready_timeout_seconds: u64,
    pub permission_request_timeout_seconds: u64,
    pub message_bus_replay_capacity: usize,
    pub scratchpad_max_bytes: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        match dotenv() {
            Ok(path) => tracing::info!("loaded .env file from: {:?}", path),
            Err(e) => tracing::debug!("no .env file loaded: {}", e),
        }

        let auto_start = parse_bool_env("KAGAN_AUTO_START", true)?;
        let auto_merge = parse_bool_env("KAGAN_AUTO_MERGE", false)?;
        let auto_approve = parse_bool_env("KAGAN_AUTO_APPROVE", false)?;
        let auto_retry_on_merge_conflict = parse_bool_env("KAGAN_AUTO_RETRY_ON_MERGE_CONFLICT", true)?;

        let max_concurrent_agents = parse_env("KAGAN_MAX_CONCURRENT_AGENTS", 3usize)?;
        if max_concurrent_agents < 1 {
            return Err(KaganError::Configuration(
                "KAGAN_MAX_CONCURRENT_AGENTS must be at least 1".to_string(),
            ));
        }

        let max_iterations = parse_env("KAGAN_MAX_ITERATIONS", 25u32)?;
        if max_iterations < 1 {
            return Err(KaganError::Configuration(
                "KAGAN_MAX_ITERATIONS must be at least 1".to_string(),
            ));
        }

        let iteration_delay_seconds = parse_env("KAGAN_ITERATION_DELAY_SECONDS", 2.0f64)?;
        if iteration_delay_seconds < 0.0 {
            return Err(KaganError::Configuration(
                "KAGAN_ITERATION_DELAY_SECONDS must be >= 0".to_string(),
            ));
        }

        let default_worker_agent = env::var("KAGAN_DEFAULT_WORKER_AGENT").unwrap_or_else(|_| "claude".to_string());
        let default_review_agent = env::var("KAGAN_DEFAULT_REVIEW_AGENT").unwrap_or_else(|_| "claude".to_string());
        let default_base_branch = env::var("KAGAN_DEFAULT_BASE_BRANCH").unwrap_or_else(|_| "main".to_string());

        let default_models = collect_default_model_overrides();

        let workspace_root = env::var("KAGAN_WORKSPACE_ROOT").unwrap_or_else(|_| "./kagan-worktrees".to_string());
        // Not independently named by the operator-config enumeration, but WorkspaceManager
        // needs a source repository to branch worktrees from, so it gets the same
        // ambient-knob treatment as workspace_root.
        let repo_dir = env::var("KAGAN_REPO_DIR").unwrap_or_else(|_| ".".to_string());

        let agent_ready_timeout_seconds = parse_env("KAGAN_AGENT_READY_TIMEOUT_SECONDS", 60u64)?;
        if agent_ready_timeout_seconds < 1 {
            return Err(KaganError::Configuration(
                "KAGAN_AGENT_READY_TIMEOUT_SECONDS must be at least 1".to_string(),
            ));
        }

        let permission_request_timeout_seconds = parse_env("KAGAN_PERMISSION_REQUEST_TIMEOUT_SECONDS", 30u64)?;
        if permission_request_timeout_seconds < 1 {
            return Err(KaganError::Configuration(
                "KAGAN_PERMISSION_REQUEST_TIMEOUT_SECONDS must be at least 1".to_string(),
            ));
        }

        let message_bus_replay_capacity = parse_env("KAGAN_MESSAGE_BUS_REPLAY_CAPACITY", 200usize)?;
        if message_bus_replay_capacity < 1 {
            return Err(KaganError::Configuration(
                "KAGAN_MESSAGE_BUS_REPLAY_CAPACITY must be at least 1".to_string(),
            ));
        }

        let scratchpad_max_bytes = parse_env("KAGAN_SCRATCHPAD_MAX_BYTES", 16384usize)?;
        if scratchpad_max_bytes < 1 {
            return Err(KaganError::Configuration(
                "KAGAN_SCRATCHPAD_MAX_BYTES must be at least 1".to_string(),
            ));
        }

        Ok(Config {
            auto_start,
            auto_merge,
            auto_approve,
            auto_retry_on_merge_conflict,
            max_concurrent_agents,
            max_iterations,
            iteration_delay_seconds,
            default_worker_agent,
            default_review_agent,
            default_base_branch,
            default_models,
            workspace_root,
            repo_dir,
            agent_ready_timeout_seconds,
            permission_request_timeout_seconds,
            message_bus_replay_capacity,
            scratchpad_max_bytes,
        })
    }

    pub fn iteration_delay(&self) -> Duration {
        Duration::from_secs_f64(self.iteration_delay_seconds)
    }

    pub fn agent_ready_timeout(&self) -> Duration {
        Duration::from_secs(self.agent_ready_timeout_seconds)
    }

    pub fn permission_request_timeout(&self) -> Duration {
        Duration::from_secs(self.permission_request_timeout_seconds)
    }

    /// Resolves a model override for `agent_identity`, e.g.
    /// `KAGAN_DEFAULT_MODEL_CLAUDE` for identity `claude`.
    pub fn model_override_for(&self, agent_identity: &str) -> Option<&str> {
        self.default_models.get(&agent_identity.to_lowercase()).map(|s| s.as_str())
    }
}

fn collect_default_model_overrides() -> HashMap<String, String> {
    const PREFIX: &str = "KAGAN_DEFAULT_MODEL_";
    env::vars()
        .filter_map(|(key, value)| {
            key.strip_prefix(PREFIX).map(|identity| (identity.to_lowercase(), value))
        })
        .collect()
}

fn parse_bool_env(key: &str, default: bool) -> Result<bool> {
    match env::var(key) {
        Ok(raw) => raw.trim().to_lowercase().parse::<bool>().map_err(|_| {
            KaganError::Configuration(format!("{key} must be \"true\" or \"false\", got {raw:?}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| KaganError::Configuration(format!("{key} could not be parsed from {raw:?}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn load_applies_defaults_when_unset() {
        for key in [
            "KAGAN_AUTO_START",
            "KAGAN_MAX_CONCURRENT_AGENTS",
            "KAGAN_MAX_ITERATIONS",
        ] {
            env::remove_var(key);
        }
        let config = Config::load().expect("defaults alone should load");
        assert!(config.auto_start);
        assert_eq!(config.max_concurrent_agents, 3);
        assert_eq!(config.max_iterations, 25);
    }

    #[test]
    #[serial]
    fn rejects_non_boolean_flag() {
        env::set_var("KAGAN_AUTO_START", "not-a-bool");
        let result = Config::load();
        env::remove_var("KAGAN_AUTO_START");
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn collects_per_agent_model_overrides() {
        env::set_var("KAGAN_DEFAULT_MODEL_CLAUDE", "claude-opus");
        let config = Config::load().expect("should load");
        env::remove_var("KAGAN_DEFAULT_MODEL_CLAUDE");
        assert_eq!(config.model_override_for("claude"), Some("claude-opus"));
    }
}
