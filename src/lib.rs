//! # Kagan Core
//!
//! Kagan Core is the task-execution subsystem behind an AI-assisted
//! development board: it drives coding-agent subprocesses against
//! isolated git worktrees, reviews their output with a second agent pass,
//! and merges approved work back onto a base branch.
//!
//! ## Architecture
//!
//! - **Scheduler**: the single-consumer event loop that owns agent lifecycle
//! - **AgentDriver**: the JSON-RPC-over-stdio protocol for driving a coding
//!   agent subprocess, with a circuit breaker guarding against a broken binary
//! - **WorkspaceManager**: per-task git worktrees on dedicated branches
//! - **ReviewEngine**: a second agent pass that approves or rejects a task's diff
//! - **MergeCoordinator**: rebase-then-merge onto the base branch
//! - **TaskStore**: the persistence seam everything above reads and writes through
//!
//! ## Usage
//!
//! Run as a standalone service: load `Config` from the environment, wire a
//! `TaskStore` and `WorkspaceManager`, and start the `Scheduler`.

/// Agent subprocess driving: JSON-RPC protocol, circuit breaker, message bus
pub mod agent;
/// Environment-driven configuration
pub mod config;
/// System-wide constants
pub mod constants;
/// Error types and handling
pub mod error;
/// Rebase-then-merge coordination
pub mod merge;
/// Core data models
pub mod models;
/// Second-pass agent review of a task's diff
pub mod review;
/// Single-consumer event loop owning agent lifecycle
pub mod scheduler;
/// Terminal-signal grammar parsed out of agent responses
pub mod signal;
/// Task persistence seam and the in-memory reference implementation
pub mod store;
/// Per-task isolated git worktrees
pub mod workspace;

pub use error::{KaganError, Result};
