//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to the language-model API:
//!     → executor.rs (pre-call breaker check, attempt loop)
//!     → operation fails: failure.rs (classify: retryable? breaker-relevant?)
//!     → circuit_breaker.rs (count failure, open at threshold)
//!     → retryable: backoff.rs (exponential delay with jitter), sleep, retry
//!     → observer.rs (every attempt and transition is reported)
//! ```
//!
//! # Design Decisions
//! - One executor per protected dependency; clones share its breaker
//! - Failures carry a closed `FailureKind`; unknown failures fail fast
//! - Jitter and observability are injected so tests are deterministic
//! - No executor-level timeout; the wrapped operation bounds itself

pub mod backoff;
pub mod circuit_breaker;
pub mod executor;
pub mod failure;
pub mod observer;
pub mod retries;

pub use backoff::{calculate_backoff, FixedJitter, JitterSource, SeededJitter, ThreadRngJitter};
pub use circuit_breaker::{BreakerStatus, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use executor::{ExecuteError, ResilientExecutor};
pub use failure::{Classification, Classify, FailureKind};
pub use observer::{ExecutionObserver, NoopObserver, TracingObserver};
pub use retries::{RetryConfig, RetryOverrides};
