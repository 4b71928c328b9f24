//! Exponential backoff with jitter.

use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::resilience::retries::RetryConfig;

/// Lower bound of the jitter factor.
pub const JITTER_MIN: f64 = 0.5;
/// Exclusive upper bound of the jitter factor.
pub const JITTER_MAX: f64 = 1.0;

/// Source of jitter factors in `[JITTER_MIN, JITTER_MAX)`.
pub trait JitterSource: Send + Sync {
    /// Next scaling factor for a backoff delay.
    fn factor(&self) -> f64;
}

/// Jitter drawn from the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn factor(&self) -> f64 {
        rand::thread_rng().gen_range(JITTER_MIN..JITTER_MAX)
    }
}

/// Reproducible jitter from a seeded RNG.
pub struct SeededJitter {
    rng: Mutex<StdRng>,
}

impl SeededJitter {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl JitterSource for SeededJitter {
    fn factor(&self) -> f64 {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_range(JITTER_MIN..JITTER_MAX)
    }
}

impl fmt::Debug for SeededJitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeededJitter").finish_non_exhaustive()
    }
}

/// Always returns the same factor, clamped into `[0.5, 1.0)`.
///
/// `FixedJitter(1.0)` still shortens each delay by the flooring of a factor
/// just below one. Disable `RetryConfig::jitter` for exact delays.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub f64);

impl JitterSource for FixedJitter {
    fn factor(&self) -> f64 {
        self.0.clamp(JITTER_MIN, JITTER_MAX - f64::EPSILON)
    }
}

fn capped_delay_ms(config: &RetryConfig, attempt: u32) -> f64 {
    let base_ms = config.base_delay.as_millis() as f64;
    if attempt == 0 || base_ms == 0.0 {
        return 0.0;
    }
    let max_ms = config.max_delay.as_millis() as f64;
    let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
    (base_ms * config.exponential_base.powi(exponent)).min(max_ms)
}

/// Delay after a failed `attempt` (1-based) before jitter is applied.
///
/// `min(base_delay * exponential_base^(attempt-1), max_delay)`
pub fn unjittered_delay(config: &RetryConfig, attempt: u32) -> Duration {
    Duration::from_millis(capped_delay_ms(config, attempt).floor() as u64)
}

/// Calculate the backoff delay after a failed `attempt`.
///
/// The jitter factor scales the capped delay, so the result never exceeds
/// `max_delay`. The result is floored to whole milliseconds.
pub fn calculate_backoff(config: &RetryConfig, attempt: u32, jitter: &dyn JitterSource) -> Duration {
    let capped = capped_delay_ms(config, attempt);
    let delay_ms = if config.jitter && capped > 0.0 {
        capped * jitter.factor()
    } else {
        capped
    };

    Duration::from_millis(delay_ms.floor() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_ms: u64, max_ms: u64, jitter: bool) -> RetryConfig {
        RetryConfig {
            base_delay: Duration::from_millis(base_ms),
            max_delay: Duration::from_millis(max_ms),
            jitter,
            ..RetryConfig::default()
        }
    }

    #[test]
    fn test_backoff_calculation() {
        let cfg = config(100, 2000, false);
        let jitter = ThreadRngJitter;

        assert_eq!(calculate_backoff(&cfg, 0, &jitter), Duration::ZERO);
        assert_eq!(calculate_backoff(&cfg, 1, &jitter), Duration::from_millis(100));
        assert_eq!(calculate_backoff(&cfg, 2, &jitter), Duration::from_millis(200));
        assert_eq!(calculate_backoff(&cfg, 3, &jitter), Duration::from_millis(400));
        assert_eq!(calculate_backoff(&cfg, 10, &jitter), Duration::from_millis(2000));
    }

    #[test]
    fn test_never_exceeds_max_delay() {
        let jitter = ThreadRngJitter;
        for jittered in [false, true] {
            let cfg = config(1000, 30_000, jittered);
            for attempt in 1..64 {
                assert!(calculate_backoff(&cfg, attempt, &jitter) <= cfg.max_delay);
            }
        }
    }

    #[test]
    fn test_non_decreasing_without_jitter() {
        let cfg = RetryConfig {
            exponential_base: 3.0,
            ..config(7, 50_000, false)
        };
        let jitter = ThreadRngJitter;

        let mut previous = Duration::ZERO;
        for attempt in 1..40 {
            let delay = calculate_backoff(&cfg, attempt, &jitter);
            assert!(delay >= previous, "attempt {attempt}: {delay:?} < {previous:?}");
            previous = delay;
        }
    }

    #[test]
    fn test_jitter_bounds_over_many_samples() {
        let cfg = config(1000, 30_000, true);
        let jitter = SeededJitter::new(42);

        for attempt in 1..6 {
            let full = unjittered_delay(&cfg, attempt);
            let lower = full.mul_f64(JITTER_MIN);
            for _ in 0..500 {
                let delay = calculate_backoff(&cfg, attempt, &jitter);
                // Flooring may land exactly on the lower bound but never reach the cap.
                assert!(delay >= lower.saturating_sub(Duration::from_millis(1)));
                assert!(delay < full, "attempt {attempt}: {delay:?} >= {full:?}");
            }
        }
    }

    #[test]
    fn test_fixed_jitter_upper_bound_is_exclusive() {
        let cfg = config(1000, 30_000, true);
        assert_eq!(calculate_backoff(&cfg, 1, &FixedJitter(1.0)), Duration::from_millis(999));
        assert_eq!(calculate_backoff(&cfg, 2, &FixedJitter(1.0)), Duration::from_millis(1999));

        let exact = config(1000, 30_000, false);
        assert_eq!(calculate_backoff(&exact, 1, &FixedJitter(1.0)), Duration::from_millis(1000));
        assert_eq!(calculate_backoff(&exact, 2, &FixedJitter(1.0)), Duration::from_millis(2000));
    }

    #[test]
    fn test_seeded_jitter_is_reproducible() {
        let a = SeededJitter::new(7);
        let b = SeededJitter::new(7);
        for _ in 0..32 {
            assert_eq!(a.factor(), b.factor());
        }
    }

    #[test]
    fn test_fixed_jitter_scales_delay() {
        let cfg = config(1000, 30_000, true);
        assert_eq!(
            calculate_backoff(&cfg, 2, &FixedJitter(0.5)),
            Duration::from_millis(1000)
        );
        assert_eq!(
            calculate_backoff(&cfg, 3, &FixedJitter(0.75)),
            Duration::from_millis(3000)
        );
    }
}
