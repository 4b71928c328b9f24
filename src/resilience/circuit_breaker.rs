//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: a trial call decides whether the dependency recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: breaker-relevant failure with failure_count >= threshold
//! Open → Half-Open: next call after recovery timeout since last failure
//! Open → Open: call before recovery timeout is rejected unexecuted
//! Half-Open → Closed: trial call succeeds (failure_count reset)
//! Half-Open → Open: trial call fails with a breaker-relevant failure
//! ```
//!
//! # Design Decisions
//! - One breaker per protected dependency, owned by its executor (no globals)
//! - Every failure bumps the counter; only breaker-relevant ones can open
//! - Each check/transition runs under one short mutex section, never across `.await`

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::resilience::failure::Classification;

/// Failures needed to open the breaker.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Time an open breaker waits before allowing a trial call.
pub const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub const fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Breaker tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
        }
    }
}

/// A state change, reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: CircuitState,
    pub to: CircuitState,
}

/// Why a call was refused by an open breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    /// Failure counter at the time of rejection.
    pub failures: u32,
    /// Time left until the breaker allows a trial call.
    pub retry_after: Duration,
}

/// Outcome of recording a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureRecord {
    pub failure_count: u32,
    pub transition: Option<Transition>,
}

/// Point-in-time view of the breaker for health checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerStatus {
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_failure: Option<Instant>,
    /// `true` unless the breaker is open.
    pub healthy: bool,
}

impl BreakerStatus {
    /// Time since the last recorded failure.
    pub fn last_failure_age(&self) -> Option<Duration> {
        self.last_failure.map(|at| at.elapsed())
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
}

impl BreakerState {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure: None,
        }
    }

    fn move_to(&mut self, to: CircuitState) -> Option<Transition> {
        let from = self.state;
        if from == to {
            return None;
        }
        self.state = to;
        Some(Transition { from, to })
    }
}

/// Circuit breaker handle. Clones share the same state.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: Arc<Mutex<BreakerState>>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreaker {
    /// Create a closed breaker.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(BreakerState::closed())),
        }
    }

    pub fn config(&self) -> CircuitBreakerConfig {
        self.config
    }

    // Every critical section writes a complete transition, so a poisoned
    // guard still holds a consistent record.
    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pre-call check.
    ///
    /// Closed and Half-Open admit the call. Open admits it only once the time
    /// since the last failure exceeds the recovery timeout, moving to
    /// Half-Open first; otherwise the call is rejected.
    pub fn try_acquire(&self) -> Result<Option<Transition>, Rejection> {
        let mut state = self.lock();
        match state.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(None),
            CircuitState::Open => {
                let elapsed = state
                    .last_failure
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed > self.config.recovery_timeout {
                    Ok(state.move_to(CircuitState::HalfOpen))
                } else {
                    Err(Rejection {
                        failures: state.failure_count,
                        retry_after: self.config.recovery_timeout - elapsed,
                    })
                }
            }
        }
    }

    /// Record a successful call. A Half-Open breaker closes and forgets its failures.
    pub fn on_success(&self) -> Option<Transition> {
        let mut state = self.lock();
        if state.state != CircuitState::HalfOpen {
            return None;
        }
        state.failure_count = 0;
        state.move_to(CircuitState::Closed)
    }

    /// Record a failed call.
    pub fn on_failure(&self, classification: Classification) -> FailureRecord {
        let mut state = self.lock();
        state.failure_count = state.failure_count.saturating_add(1);
        state.last_failure = Some(Instant::now());

        let transition = if classification.breaker_relevant
            && state.failure_count >= self.config.failure_threshold
        {
            state.move_to(CircuitState::Open)
        } else {
            None
        };

        FailureRecord {
            failure_count: state.failure_count,
            transition,
        }
    }

    /// Current state.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Snapshot for health endpoints.
    pub fn status(&self) -> BreakerStatus {
        let state = self.lock();
        BreakerStatus {
            state: state.state,
            failure_count: state.failure_count,
            last_failure: state.last_failure,
            healthy: state.state != CircuitState::Open,
        }
    }

    /// Force the breaker closed with a zero failure counter.
    pub fn reset(&self) -> Option<Transition> {
        let mut state = self.lock();
        state.failure_count = 0;
        state.last_failure = None;
        state.move_to(CircuitState::Closed)
    }
}
