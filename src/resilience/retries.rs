//! Retry configuration.
//!
//! # Responsibilities
//! - Hold the per-call retry parameters (attempts, delays, jitter)
//! - Merge partial per-call overrides over process-wide defaults
//!
//! # Design Decisions
//! - `RetryConfig` is an immutable value; a call never mutates it
//! - Overrides are all-optional so call sites only name what they change

use std::time::Duration;

/// Retry parameters for a single `execute_with_retry` call.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one. At least 1.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Growth factor between consecutive delays.
    pub exponential_base: f64,
    /// Scale each delay by a random factor in `[0.5, 1.0)`.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            exponential_base: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// A config that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Apply `overrides` on top of this config.
    ///
    /// `max_attempts` is clamped to at least 1 and a non-finite or sub-1
    /// `exponential_base` falls back to this config's value.
    pub fn merged(&self, overrides: &RetryOverrides) -> Self {
        let exponential_base = overrides
            .exponential_base
            .filter(|b| b.is_finite() && *b >= 1.0)
            .unwrap_or(self.exponential_base);

        Self {
            max_attempts: overrides.max_attempts.unwrap_or(self.max_attempts).max(1),
            base_delay: overrides.base_delay.unwrap_or(self.base_delay),
            max_delay: overrides.max_delay.unwrap_or(self.max_delay),
            exponential_base,
            jitter: overrides.jitter.unwrap_or(self.jitter),
        }
    }
}

/// Partial retry configuration supplied per call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryOverrides {
    pub max_attempts: Option<u32>,
    pub base_delay: Option<Duration>,
    pub max_delay: Option<Duration>,
    pub exponential_base: Option<f64>,
    pub jitter: Option<bool>,
}

impl RetryOverrides {
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = Some(delay);
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    pub fn exponential_base(mut self, base: f64) -> Self {
        self.exponential_base = Some(base);
        self
    }

    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = Some(enabled);
        self
    }
}
