//! Resilient executor: retries, backoff and circuit breaking around one async operation.

use std::future::{self, Future};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::resilience::backoff::{calculate_backoff, JitterSource, ThreadRngJitter};
use crate::resilience::circuit_breaker::{
    BreakerStatus, CircuitBreaker, CircuitBreakerConfig, CircuitState,
};
use crate::resilience::failure::{Classify, FailureKind};
use crate::resilience::observer::{ExecutionObserver, TracingObserver};
use crate::resilience::retries::{RetryConfig, RetryOverrides};

/// Terminal failure of an executed operation.
#[derive(Debug, Error)]
pub enum ExecuteError<E> {
    /// The breaker is open; the operation was not invoked.
    #[error("circuit breaker is open ({failures} failures, retry in {retry_after:?})")]
    CircuitOpen { failures: u32, retry_after: Duration },

    /// The last observed failure after `attempts` invocations.
    #[error("operation failed after {attempts} attempt(s): {source}")]
    Failed {
        attempts: u32,
        #[source]
        source: E,
    },

    /// A cancellation signal arrived during a backoff delay.
    #[error("operation cancelled after {attempts} attempt(s): {source}")]
    Cancelled {
        attempts: u32,
        #[source]
        source: E,
    },
}

impl<E: Classify> ExecuteError<E> {
    /// Failure kind of the underlying operation error, if one was observed.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            ExecuteError::CircuitOpen { .. } => None,
            ExecuteError::Failed { source, .. } | ExecuteError::Cancelled { source, .. } => {
                Some(source.failure_kind())
            }
        }
    }
}

impl<E> ExecuteError<E> {
    /// Number of times the operation was invoked.
    pub fn attempts(&self) -> u32 {
        match self {
            ExecuteError::CircuitOpen { .. } => 0,
            ExecuteError::Failed { attempts, .. } | ExecuteError::Cancelled { attempts, .. } => {
                *attempts
            }
        }
    }

    /// The operation error, if one was observed.
    pub fn into_source(self) -> Option<E> {
        match self {
            ExecuteError::CircuitOpen { .. } => None,
            ExecuteError::Failed { source, .. } | ExecuteError::Cancelled { source, .. } => {
                Some(source)
            }
        }
    }
}

/// Wraps unreliable async operations with retry, backoff and a circuit breaker.
///
/// One executor protects one dependency. Clones share the breaker, so a
/// single instance can be handed to every call site of that dependency.
#[derive(Clone)]
pub struct ResilientExecutor {
    breaker: CircuitBreaker,
    defaults: RetryConfig,
    jitter: Arc<dyn JitterSource>,
    observer: Arc<dyn ExecutionObserver>,
}

impl Default for ResilientExecutor {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl std::fmt::Debug for ResilientExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientExecutor")
            .field("breaker", &self.breaker)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl ResilientExecutor {
    /// Create an executor with a closed breaker, default retry settings,
    /// thread-local jitter and the tracing observer.
    pub fn new(breaker: CircuitBreakerConfig) -> Self {
        Self {
            breaker: CircuitBreaker::new(breaker),
            defaults: RetryConfig::default(),
            jitter: Arc::new(ThreadRngJitter),
            observer: Arc::new(TracingObserver::default()),
        }
    }

    /// Replace the process-wide retry defaults that per-call overrides merge over.
    pub fn with_defaults(mut self, defaults: RetryConfig) -> Self {
        self.defaults = defaults;
        self
    }

    /// Replace the jitter source.
    pub fn with_jitter(mut self, jitter: Arc<dyn JitterSource>) -> Self {
        self.jitter = jitter;
        self
    }

    /// Replace the observer.
    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn defaults(&self) -> &RetryConfig {
        &self.defaults
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Breaker state, failure counter, last failure and health flag.
    pub fn status(&self) -> BreakerStatus {
        self.breaker.status()
    }

    /// Administrative reset: breaker closed, counter zero.
    pub fn reset(&self) {
        if let Some(transition) = self.breaker.reset() {
            self.observer.on_transition("reset", transition);
        }
    }

    /// Run `operation` with the default retry settings.
    pub async fn execute<T, E, F, Fut>(&self, operation: F, context: &str) -> Result<T, ExecuteError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        self.execute_with_retry(operation, context, RetryOverrides::default())
            .await
    }

    /// Run `operation` under the breaker, retrying retryable failures with backoff.
    ///
    /// Returns the first success, `CircuitOpen` if the breaker refuses the
    /// call, or `Failed` carrying the last failure.
    pub async fn execute_with_retry<T, E, F, Fut>(
        &self,
        operation: F,
        context: &str,
        overrides: RetryOverrides,
    ) -> Result<T, ExecuteError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        self.execute_with_cancel(operation, context, overrides, future::pending())
            .await
    }

    /// Like `execute_with_retry`, but aborts with `Cancelled` if `cancel`
    /// resolves while waiting between attempts.
    pub async fn execute_with_cancel<T, E, F, Fut, C>(
        &self,
        mut operation: F,
        context: &str,
        overrides: RetryOverrides,
        cancel: C,
    ) -> Result<T, ExecuteError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
        C: Future<Output = ()>,
    {
        let config = self.defaults.merged(&overrides);
        tokio::pin!(cancel);

        match self.breaker.try_acquire() {
            Ok(Some(transition)) => self.observer.on_transition(context, transition),
            Ok(None) => {}
            Err(rejection) => {
                self.observer.on_rejected(context, rejection);
                return Err(ExecuteError::CircuitOpen {
                    failures: rejection.failures,
                    retry_after: rejection.retry_after,
                });
            }
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            self.observer.on_attempt(context, attempt, config.max_attempts);

            let error = match operation().await {
                Ok(value) => {
                    if let Some(transition) = self.breaker.on_success() {
                        self.observer.on_transition(context, transition);
                    }
                    self.observer.on_success(context, attempt);
                    return Ok(value);
                }
                Err(error) => error,
            };

            let kind = error.failure_kind();
            let classification = kind.classify();
            let record = self.breaker.on_failure(classification);
            self.observer
                .on_failure(context, attempt, kind, classification, record.failure_count);
            if let Some(transition) = record.transition {
                self.observer.on_transition(context, transition);
            }

            if !classification.retryable || attempt >= config.max_attempts {
                return Err(ExecuteError::Failed {
                    attempts: attempt,
                    source: error,
                });
            }

            let delay = calculate_backoff(&config, attempt, self.jitter.as_ref());
            self.observer.on_retry_scheduled(context, attempt, delay);

            tokio::select! {
                biased;
                _ = &mut cancel => {
                    self.observer.on_cancelled(context, attempt);
                    return Err(ExecuteError::Cancelled { attempts: attempt, source: error });
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Whether the breaker currently refuses calls.
    pub fn is_open(&self) -> bool {
        self.breaker.state() == CircuitState::Open
    }
}
