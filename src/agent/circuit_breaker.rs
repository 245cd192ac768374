//! Circuit breaker guarding agent subprocess startup.
//!
//! Repeated `AgentStartupFailure`s should briefly short-circuit new spawn
//! attempts instead of hammering a broken `run_command`; this is the same
//! closed/open/half-open pattern used for resilience against any flaky
//! external dependency.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_duration: Duration,
    pub success_threshold: u32,
    pub failure_window: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: crate::constants::AGENT_CIRCUIT_FAILURE_THRESHOLD,
            open_duration: Duration::from_secs(crate::constants::AGENT_CIRCUIT_OPEN_SECS),
            success_threshold: crate::constants::AGENT_CIRCUIT_SUCCESS_THRESHOLD,
            failure_window: Duration::from_secs(300),
        }
    }
}

/// Tracks consecutive agent-startup failures and briefly refuses new spawn
/// attempts once a threshold is crossed.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: RwLock<CircuitState>,
    failure_count: AtomicU32,
    success_count: AtomicU32,
    last_failure_time: RwLock<Option<Instant>>,
    last_state_change: RwLock<Instant>,
    total_attempts: AtomicU64,
    total_failures: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicU32::new(0),
            success_count: AtomicU32::new(0),
            last_failure_time: RwLock::new(None),
            last_state_change: RwLock::new(Instant::now()),
            total_attempts: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
        }
    }

    /// Whether a new spawn attempt should proceed. When the breaker is open
    /// but its timeout has elapsed, flips to half-open and allows one probe.
    pub async fn should_allow_spawn(&self) -> bool {
        self.total_attempts.fetch_add(1, Ordering::Relaxed);

        match *self.state.read().await {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = self.last_state_change.read().await.elapsed();
                if elapsed >= self.config.open_duration {
                    self.transition_to_half_open().await;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => true,
        }
    }

    pub async fn record_success(&self) {
        match *self.state.read().await {
            CircuitState::HalfOpen => {
                let count = self.success_count.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(count, threshold = self.config.success_threshold, "agent circuit half-open success");
                if count >= self.config.success_threshold {
                    self.transition_to_closed().await;
                }
            }
            CircuitState::Closed => {
                self.failure_count.store(0, Ordering::Relaxed);
            }
            CircuitState::Open => {
                warn!("success recorded while agent circuit is open");
            }
        }
    }

    pub async fn record_failure(&self) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);

        match *self.state.read().await {
            CircuitState::Closed => {
                let mut last_failure = self.last_failure_time.write().await;
                let now = Instant::now();
                let within_window = last_failure
                    .map(|t| now.duration_since(t) <= self.config.failure_window)
                    .unwrap_or(false);

                if within_window {
                    let count = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
                    if count >= self.config.failure_threshold {
                        drop(last_failure);
                        self.transition_to_open().await;
                        *self.last_failure_time.write().await = Some(now);
                        return;
                    }
                } else {
                    self.failure_count.store(1, Ordering::Relaxed);
                }
                *last_failure = Some(now);
            }
            CircuitState::HalfOpen => {
                self.transition_to_open().await;
            }
            CircuitState::Open => {
                *self.last_failure_time.write().await = Some(Instant::now());
            }
        }
    }

    async fn transition_to_open(&self) {
        let mut state = self.state.write().await;
        let previous = *state;
        *state = CircuitState::Open;
        *self.last_state_change.write().await = Instant::now();
        self.success_count.store(0, Ordering::Relaxed);
        warn!(?previous, "agent circuit breaker opened");
    }

    async fn transition_to_half_open(&self) {
        *self.state.write().await = CircuitState::HalfOpen;
        *self.last_state_change.write().await = Instant::now();
        self.success_count.store(0, Ordering::Relaxed);
        self.failure_count.store(0, Ordering::Relaxed);
        info!("agent circuit breaker half-open");
    }

    async fn transition_to_closed(&self) {
        let mut state = self.state.write().await;
        let previous = *state;
        *state = CircuitState::Closed;
        *self.last_state_change.write().await = Instant::now();
        self.failure_count.store(0, Ordering::Relaxed);
        self.success_count.store(0, Ordering::Relaxed);
        info!(?previous, "agent circuit breaker closed");
    }

    pub async fn state(&self) -> CircuitState {
        *self.state.read().await
    }
}

pub type SharedCircuitBreaker = Arc<CircuitBreaker>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 2,
            ..CircuitBreakerConfig::default()
        });

        assert!(breaker.should_allow_spawn().await);
        breaker.record_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Closed);
        breaker.record_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Open);
        assert!(!breaker.should_allow_spawn().await);
    }

    #[tokio::test]
    async fn success_resets_closed_failure_count() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 2,
            ..CircuitBreakerConfig::default()
        });
        breaker.record_failure().await;
        breaker.record_success().await;
        breaker.record_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }
}
