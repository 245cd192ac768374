//! Concrete `AgentDriver`: drives a coding-agent subprocess over a
//! line-delimited JSON-RPC protocol on its stdin/stdout, the way an editor
//! drives an Agent Client Protocol server.

use super::{
    AgentDriver, AgentUpdate, CircuitBreaker, CircuitBreakerConfig, MessageBus, PermissionResponder, RequestPermission,
    StopReason, ToolCall, ToolCallUpdate,
};
use crate::error::{KaganError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

/// Line-delimited JSON-RPC envelope, both directions.
#[derive(Debug, Serialize, Deserialize)]
struct RpcMessage {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<serde_json::Value>,
}

struct ChildHandle {
    child: Child,
    stdin: tokio::process::ChildStdin,
}

/// Wire shape of an inbound `session/request_permission` call — just the
/// fields the agent actually sends. The responder channel is attached
/// afterward, not part of the wire payload.
#[derive(Debug, Deserialize)]
struct PermissionRequestWire {
    tool_call: ToolCall,
    options: Vec<String>,
}

/// Drives `agent_command` (e.g. the configured coding-agent binary) as a
/// subprocess, speaking newline-delimited JSON-RPC on its stdin/stdout.
/// Startup attempts are gated by a `CircuitBreaker` so a broken binary can't
/// be retried in a hot loop.
pub struct ProcessAgentDriver {
    agent_command: String,
    agent_args: Vec<String>,
    circuit_breaker: Arc<CircuitBreaker>,
    bus: Arc<MessageBus>,
    handle: Arc<Mutex<Option<ChildHandle>>>,
    ready: AtomicBool,
    cancelled: AtomicBool,
    response_text: Arc<Mutex<String>>,
    next_request_id: AtomicU64,
    /// When set, inbound permission requests are answered `allow_once`
    /// without ever reaching a subscriber.
    auto_approve: bool,
    /// How long to wait for a subscriber to answer a forwarded permission
    /// request before falling back to a reject-class option.
    permission_timeout: Duration,
}

impl ProcessAgentDriver {
    pub fn new(
        agent_command: String,
        agent_args: Vec<String>,
        replay_capacity: usize,
        auto_approve: bool,
        permission_timeout: Duration,
    ) -> Self {
        Self {
            agent_command,
            agent_args,
            circuit_breaker: Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default())),
            bus: Arc::new(MessageBus::new(replay_capacity)),
            handle: Arc::new(Mutex::new(None)),
            ready: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            response_text: Arc::new(Mutex::new(String::new())),
            next_request_id: AtomicU64::new(1),
            auto_approve,
            permission_timeout,
        }
    }

    async fn write_message(&self, message: &RpcMessage) -> Result<()> {
        Self::write_message_via(&self.handle, message).await
    }

    async fn write_message_via(handle: &Arc<Mutex<Option<ChildHandle>>>, message: &RpcMessage) -> Result<()> {
        let mut guard = handle.lock().await;
        let handle = guard
            .as_mut()
            .ok_or_else(|| KaganError::AgentRuntimeError {
                task_id: String::new(),
                message: "driver not started".to_string(),
            })?;
        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        handle.stdin.write_all(line.as_bytes()).await?;
        handle.stdin.flush().await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn_reader(
        bus: Arc<MessageBus>,
        response_text: Arc<Mutex<String>>,
        stdout: tokio::process::ChildStdout,
        handle: Arc<Mutex<Option<ChildHandle>>>,
        auto_approve: bool,
        permission_timeout: Duration,
        read_only: bool,
    ) {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        Self::handle_line(&bus, &response_text, &handle, auto_approve, permission_timeout, read_only, &line)
                            .await;
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "agent stdout read error");
                        break;
                    }
                }
            }
        });
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_line(
        bus: &Arc<MessageBus>,
        response_text: &Arc<Mutex<String>>,
        handle: &Arc<Mutex<Option<ChildHandle>>>,
        auto_approve: bool,
        permission_timeout: Duration,
        read_only: bool,
        line: &str,
    ) {
        let parsed: serde_json::Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, line, "unparsable agent line, ignoring");
                return;
            }
        };

        let method = parsed.get("method").and_then(|m| m.as_str());
        let id = parsed.get("id").and_then(|v| v.as_u64());
        let params = parsed.get("params").cloned().unwrap_or(serde_json::Value::Null);

        match method {
            Some("session/update") => {
                if let Some(text) = params.get("text").and_then(|t| t.as_str()) {
                    response_text.lock().await.push_str(text);
                    bus.publish(AgentUpdate::Text(text.to_string())).await;
                } else if let Some(text) = params.get("thought").and_then(|t| t.as_str()) {
                    bus.publish(AgentUpdate::Thinking(text.to_string())).await;
                } else if let Ok(tool_call) = serde_json::from_value::<ToolCall>(params.clone()) {
                    bus.publish(AgentUpdate::ToolCall(tool_call)).await;
                } else if let Ok(update) = serde_json::from_value::<ToolCallUpdate>(params) {
                    bus.publish(AgentUpdate::ToolCallUpdate(update)).await;
                }
            }
            Some("session/request_permission") => {
                let Some(id) = id else {
                    debug!("request_permission call missing id, cannot respond, ignoring");
                    return;
                };
                if let Ok(wire) = serde_json::from_value::<PermissionRequestWire>(params) {
                    let bus = bus.clone();
                    let handle = handle.clone();
                    tokio::spawn(async move {
                        Self::resolve_permission_request(id, wire, handle, bus, auto_approve, permission_timeout).await;
                    });
                }
            }
            Some(m @ ("fs/write_text_file" | "terminal/create")) if read_only => {
                if let Some(id) = id {
                    let refusal = RpcMessage {
                        jsonrpc: "2.0",
                        id: Some(id),
                        method: None,
                        params: None,
                        result: Some(serde_json::json!({
                            "error": format!("read-only session: refusing {m}")
                        })),
                    };
                    let _ = Self::write_message_via(handle, &refusal).await;
                }
            }
            _ => {
                debug!(?method, "unhandled agent notification");
            }
        }
    }

    /// Auto-approve mode answers `allow_once` immediately. Otherwise the
    /// request is published to subscribers and this waits on the responder
    /// channel up to `permission_timeout`, falling back to the first
    /// reject-class option (else `cancel`) if nobody answers in time.
    async fn resolve_permission_request(
        id: u64,
        wire: PermissionRequestWire,
        handle: Arc<Mutex<Option<ChildHandle>>>,
        bus: Arc<MessageBus>,
        auto_approve: bool,
        permission_timeout: Duration,
    ) {
        let (tx, rx) = oneshot::channel();
        let responder: PermissionResponder = Arc::new(StdMutex::new(Some(tx)));
        let request = RequestPermission {
            tool_call: wire.tool_call,
            options: wire.options.clone(),
            respond: responder,
        };

        let chosen = if auto_approve {
            request.respond("allow_once".to_string());
            rx.await.unwrap_or_else(|_| "allow_once".to_string())
        } else {
            bus.publish(AgentUpdate::RequestPermission(request)).await;
            match tokio::time::timeout(permission_timeout, rx).await {
                Ok(Ok(option)) => option,
                _ => wire
                    .options
                    .iter()
                    .find(|o| o.to_lowercase().contains("reject"))
                    .cloned()
                    .unwrap_or_else(|| "cancel".to_string()),
            }
        };

        let response = RpcMessage {
            jsonrpc: "2.0",
            id: Some(id),
            method: None,
            params: None,
            result: Some(serde_json::json!({ "outcome": chosen })),
        };
        let _ = Self::write_message_via(&handle, &response).await;
    }
}

#[async_trait]
impl AgentDriver for ProcessAgentDriver {
    async fn start(&self, working_dir: &Path, model_override: Option<&str>, read_only: bool) -> Result<()> {
        if !self.circuit_breaker.should_allow_spawn().await {
            return Err(KaganError::AgentStartupFailure {
                message: "circuit breaker open, refusing to spawn agent".to_string(),
            });
        }

        let mut command = Command::new(&self.agent_command);
        command
            .args(&self.agent_args)
            .current_dir(working_dir)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                self.circuit_breaker.record_failure().await;
                return Err(KaganError::AgentStartupFailure {
                    message: format!("failed to spawn agent process: {e}"),
                });
            }
        };

        let stdout = child.stdout.take().ok_or_else(|| KaganError::AgentStartupFailure {
            message: "agent process has no stdout".to_string(),
        })?;
        let stdin = child.stdin.take().ok_or_else(|| KaganError::AgentStartupFailure {
            message: "agent process has no stdin".to_string(),
        })?;

        Self::spawn_reader(
            self.bus.clone(),
            self.response_text.clone(),
            stdout,
            self.handle.clone(),
            self.auto_approve,
            self.permission_timeout,
            read_only,
        );

        *self.handle.lock().await = Some(ChildHandle { child, stdin });
        self.circuit_breaker.record_success().await;

        let init = RpcMessage {
            jsonrpc: "2.0",
            id: Some(self.next_request_id.fetch_add(1, Ordering::Relaxed)),
            method: Some("initialize".to_string()),
            params: Some(serde_json::json!({
                "modelOverride": model_override,
                "readOnly": read_only,
            })),
            result: None,
        };
        self.write_message(&init).await?;

        Ok(())
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.ready.load(Ordering::Relaxed) {
                return Ok(());
            }
            // The handshake above is fire-and-forget; treat a live process as
            // ready once it has not exited. A real ACP server confirms via an
            // `initialize` response that the reader loop would record.
            if self.handle.lock().await.is_some() {
                self.ready.store(true, Ordering::Relaxed);
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        Err(KaganError::Timeout(timeout))
    }

    async fn send_prompt(&self, prompt: &str) -> Result<StopReason> {
        self.response_text.lock().await.clear();
        self.cancelled.store(false, Ordering::Relaxed);

        let message = RpcMessage {
            jsonrpc: "2.0",
            id: Some(self.next_request_id.fetch_add(1, Ordering::Relaxed)),
            method: Some("session/prompt".to_string()),
            params: Some(serde_json::json!({ "prompt": prompt })),
            result: None,
        };
        self.write_message(&message).await?;

        if self.cancelled.load(Ordering::Relaxed) {
            Ok(StopReason::Cancelled)
        } else {
            Ok(StopReason::EndTurn)
        }
    }

    async fn cancel(&self) -> Result<()> {
        self.cancelled.store(true, Ordering::Relaxed);
        let message = RpcMessage {
            jsonrpc: "2.0",
            id: None,
            method: Some("session/cancel".to_string()),
            params: Some(serde_json::json!({})),
            result: None,
        };
        self.write_message(&message).await
    }

    async fn stop(&self) -> Result<()> {
        let mut guard = self.handle.lock().await;
        if let Some(mut handle) = guard.take() {
            let _ = handle.child.kill().await;
        }
        self.ready.store(false, Ordering::Relaxed);
        Ok(())
    }

    async fn response_text(&self) -> String {
        self.response_text.lock().await.clone()
    }

    async fn subscribe(&self) -> tokio::sync::mpsc::UnboundedReceiver<AgentUpdate> {
        self.bus.subscribe().await
    }
}
