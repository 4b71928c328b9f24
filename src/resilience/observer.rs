//! Observability hooks for the resilient executor.
//!
//! The executor reports attempts and breaker transitions only through an
//! `ExecutionObserver`. Hooks are advisory: they return nothing and cannot
//! change the control flow.

use std::time::Duration;

use crate::observability::metrics;
use crate::resilience::circuit_breaker::{Rejection, Transition};
use crate::resilience::failure::{Classification, FailureKind};

/// Receiver of executor events. All hooks default to no-ops.
pub trait ExecutionObserver: Send + Sync {
    /// An attempt is about to invoke the operation.
    fn on_attempt(&self, _context: &str, _attempt: u32, _max_attempts: u32) {}

    /// The operation succeeded.
    fn on_success(&self, _context: &str, _attempt: u32) {}

    /// The operation failed.
    fn on_failure(
        &self,
        _context: &str,
        _attempt: u32,
        _kind: FailureKind,
        _classification: Classification,
        _failure_count: u32,
    ) {
    }

    /// The executor will sleep `delay` before the next attempt.
    fn on_retry_scheduled(&self, _context: &str, _attempt: u32, _delay: Duration) {}

    /// The breaker changed state.
    fn on_transition(&self, _context: &str, _transition: Transition) {}

    /// An open breaker refused the call.
    fn on_rejected(&self, _context: &str, _rejection: Rejection) {}

    /// A cancellation signal ended the retry loop.
    fn on_cancelled(&self, _context: &str, _attempts: u32) {}
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ExecutionObserver for NoopObserver {}

/// Default observer: structured `tracing` events plus `metrics` counters.
///
/// `context` is free-form and per call, so it only appears in log events.
/// Metrics carry the fixed `dependency` label instead.
#[derive(Debug, Clone, Copy)]
pub struct TracingObserver {
    dependency: &'static str,
}

impl TracingObserver {
    pub const DEFAULT_DEPENDENCY: &'static str = "default";

    pub fn new(dependency: &'static str) -> Self {
        Self { dependency }
    }

    pub fn dependency(&self) -> &'static str {
        self.dependency
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DEPENDENCY)
    }
}

impl ExecutionObserver for TracingObserver {
    fn on_attempt(&self, context: &str, attempt: u32, max_attempts: u32) {
        tracing::debug!(context, attempt, max_attempts, "Executing attempt");
        metrics::record_attempt(self.dependency);
    }

    fn on_success(&self, context: &str, attempt: u32) {
        if attempt > 1 {
            tracing::info!(context, attempt, "Operation succeeded after retry");
        }
    }

    fn on_failure(
        &self,
        context: &str,
        attempt: u32,
        kind: FailureKind,
        classification: Classification,
        failure_count: u32,
    ) {
        tracing::warn!(
            context,
            attempt,
            kind = %kind,
            retryable = classification.retryable,
            breaker_relevant = classification.breaker_relevant,
            failure_count,
            "Attempt failed"
        );
        metrics::record_failure(self.dependency, kind.as_str());
    }

    fn on_retry_scheduled(&self, context: &str, attempt: u32, delay: Duration) {
        tracing::info!(context, attempt, delay_ms = delay.as_millis() as u64, "Retrying after backoff");
        metrics::record_retry(self.dependency);
    }

    fn on_transition(&self, context: &str, transition: Transition) {
        tracing::warn!(
            context,
            from = transition.from.as_str(),
            to = transition.to.as_str(),
            "Circuit breaker state changed"
        );
        metrics::record_breaker_transition(self.dependency, transition.to.as_str());
    }

    fn on_rejected(&self, context: &str, rejection: Rejection) {
        tracing::warn!(
            context,
            failures = rejection.failures,
            retry_after_ms = rejection.retry_after.as_millis() as u64,
            "Circuit open, call rejected"
        );
        metrics::record_breaker_rejection(self.dependency);
    }

    fn on_cancelled(&self, context: &str, attempts: u32) {
        tracing::info!(context, attempts, "Retry loop cancelled during backoff");
    }
}
