//! The agent driver seam: everything the Scheduler/ReviewEngine need from a
//! running coding-agent subprocess, independent of the wire protocol actually
//! spoken to it.

pub mod circuit_breaker;
pub mod message_bus;
pub mod process_driver;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use message_bus::MessageBus;
pub use process_driver::ProcessAgentDriver;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::oneshot;

/// A tool invocation the agent is about to perform or has performed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub title: String,
    pub kind: String,
}

/// Status update for a previously announced tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallUpdate {
    pub id: String,
    pub status: String,
    pub detail: Option<String>,
}

/// The first (and only) resolution of a permission request. Shared behind an
/// `Arc` so the owning `AgentUpdate` can still be `Clone`d for multi-subscriber
/// fan-out; whichever caller's `respond` wins, the rest are no-ops.
pub type PermissionResponder = Arc<StdMutex<Option<oneshot::Sender<String>>>>;

/// A request from the agent for permission to take some action (e.g. write
/// a file, run a shell command). AUTO tasks answer these automatically per
/// the configured policy; PAIR tasks forward them to the human operator.
/// Never buffered in the message bus's replay history — a permission
/// request answered by a no-longer-attached subscriber makes no sense.
#[derive(Debug, Clone)]
pub struct RequestPermission {
    pub tool_call: ToolCall,
    pub options: Vec<String>,
    pub respond: PermissionResponder,
}

impl RequestPermission {
    /// Resolves the request with `option`. A no-op if already answered.
    pub fn respond(&self, option: String) {
        if let Some(tx) = self.respond.lock().unwrap().take() {
            let _ = tx.send(option);
        }
    }
}

/// One update emitted on an agent's session while it works. This is the
/// vocabulary the message bus replays and that drivers push into.
#[derive(Debug, Clone)]
pub enum AgentUpdate {
    Thinking(String),
    Text(String),
    ToolCall(ToolCall),
    ToolCallUpdate(ToolCallUpdate),
    RequestPermission(RequestPermission),
}

/// Why an agent session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    EndTurn,
    Cancelled,
    Error,
}

/// Everything the Scheduler and ReviewEngine need from a running coding-agent
/// process. `ProcessAgentDriver` is the one concrete implementation this
/// crate ships; anything that can start, stream updates, and accept a
/// cancellation can fill this seam (a test double, a different wire
/// protocol, a remote driver).
#[async_trait]
pub trait AgentDriver: Send + Sync {
    /// Launches the underlying subprocess and performs its handshake.
    /// `model_override` requests a specific model for this session;
    /// `read_only` forces the driver to refuse write-side tool calls
    /// (`write_text_file`, `terminal/create`). Must be safe to call at most
    /// once per driver instance.
    async fn start(&self, working_dir: &std::path::Path, model_override: Option<&str>, read_only: bool) -> Result<()>;

    /// Blocks until the agent reports it is ready to accept a prompt, or
    /// `timeout` elapses.
    async fn wait_ready(&self, timeout: Duration) -> Result<()>;

    /// Sends a prompt and drives the session until the agent signals it has
    /// finished producing output for this turn.
    async fn send_prompt(&self, prompt: &str) -> Result<StopReason>;

    /// Cooperatively cancels an in-flight turn without tearing down the
    /// underlying process.
    async fn cancel(&self) -> Result<()>;

    /// Tears down the subprocess. Idempotent.
    async fn stop(&self) -> Result<()>;

    /// The full accumulated text response for the most recent turn, used by
    /// the terminal-signal scanner.
    async fn response_text(&self) -> String;

    /// Registers a listener for `AgentUpdate`s, replaying buffered history
    /// first per the message bus's replay contract.
    async fn subscribe(&self) -> tokio::sync::mpsc::UnboundedReceiver<AgentUpdate>;
}
