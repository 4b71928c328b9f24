//! Sliding-window rate limiting per client identifier.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use tokio::time::Instant;

use crate::http::request::ClientId;
use crate::http::response;
use crate::observability::metrics;

/// Admits at most `max_requests` per identifier within any rolling `window`.
///
/// Each identifier owns an ordered queue of admission timestamps. Expired
/// entries are purged lazily; identifiers whose queue empties are dropped.
#[derive(Debug)]
pub struct WindowRateLimiter {
    windows: DashMap<String, VecDeque<Instant>>,
    max_requests: usize,
    window: Duration,
}

fn purge(entries: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&oldest) = entries.front() {
        if now.saturating_duration_since(oldest) >= window {
            entries.pop_front();
        } else {
            break;
        }
    }
}

impl WindowRateLimiter {
    /// `max_requests = 0` rejects every call.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests,
            window,
        }
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Admit or reject one request for `identifier`.
    ///
    /// Purge, count and append happen under the identifier's shard lock.
    /// A rejection leaves the window untouched.
    pub fn check_limit(&self, identifier: &str) -> bool {
        let admitted = {
            let mut entries = self.windows.entry(identifier.to_owned()).or_default();
            let now = Instant::now();
            purge(&mut entries, now, self.window);
            if entries.len() < self.max_requests {
                entries.push_back(now);
                true
            } else {
                false
            }
        };

        self.windows.remove_if(identifier, |_, entries| entries.is_empty());
        admitted
    }

    fn live_entries(&self, identifier: &str) -> Option<(usize, Option<Instant>)> {
        let entries = self.windows.get(identifier)?;
        let now = Instant::now();
        let mut live = entries
            .iter()
            .filter(|&&at| now.saturating_duration_since(at) < self.window);
        let oldest = live.next().copied();
        let count = oldest.map_or(0, |_| 1 + live.count());
        Some((count, oldest))
    }

    /// Quota left for `identifier` in the current window. Does not mutate state.
    pub fn remaining(&self, identifier: &str) -> usize {
        let used = self.live_entries(identifier).map_or(0, |(count, _)| count);
        self.max_requests.saturating_sub(used)
    }

    /// When the oldest live entry for `identifier` expires, or `None` if it has none.
    pub fn reset_at(&self, identifier: &str) -> Option<Instant> {
        self.live_entries(identifier)
            .and_then(|(_, oldest)| oldest)
            .map(|oldest| oldest + self.window)
    }

    /// Time until `identifier` regains quota. Zero when nothing is tracked.
    pub fn retry_after(&self, identifier: &str) -> Duration {
        self.reset_at(identifier)
            .map(|at| at.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO)
    }

    /// Purge every identifier and drop the empty ones. Returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows.retain(|_, entries| {
            purge(entries, now, self.window);
            !entries.is_empty()
        });
        before.saturating_sub(self.windows.len())
    }

    /// Number of identifiers currently holding state.
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }

    /// Forget `identifier`'s history.
    pub fn reset(&self, identifier: &str) {
        self.windows.remove(identifier);
    }
}

/// Middleware rejecting requests over the per-client quota with 429.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<WindowRateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = ClientId::from_request(&request);
    let key = client.key();

    if limiter.check_limit(&key) {
        next.run(request).await
    } else {
        let retry_after = limiter.retry_after(&key);
        tracing::warn!(
            client = %client,
            retry_after_ms = retry_after.as_millis() as u64,
            "Rate limit exceeded"
        );
        metrics::record_rate_limited(client.kind());
        response::too_many_requests(retry_after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits_exactly_max_requests() {
        let limiter = WindowRateLimiter::new(3, Duration::from_secs(60));

        for _ in 0..3 {
            assert!(limiter.check_limit("alice"));
        }
        assert!(!limiter.check_limit("alice"));
        assert_eq!(limiter.remaining("alice"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_rolls_over() {
        let limiter = WindowRateLimiter::new(2, Duration::from_millis(500));

        assert!(limiter.check_limit("alice"));
        assert!(limiter.check_limit("alice"));
        assert!(!limiter.check_limit("alice"));

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(limiter.check_limit("alice"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_one_by_one() {
        let limiter = WindowRateLimiter::new(2, Duration::from_millis(1000));

        assert!(limiter.check_limit("alice"));
        tokio::time::advance(Duration::from_millis(400)).await;
        assert!(limiter.check_limit("alice"));
        assert!(!limiter.check_limit("alice"));

        // Only the first entry has expired.
        tokio::time::advance(Duration::from_millis(600)).await;
        assert_eq!(limiter.remaining("alice"), 1);
        assert!(limiter.check_limit("alice"));
        assert!(!limiter.check_limit("alice"));
    }

    #[test]
    fn test_zero_quota_rejects_everything() {
        let limiter = WindowRateLimiter::new(0, Duration::from_secs(1));

        for id in ["alice", "bob", ""] {
            assert!(!limiter.check_limit(id));
            assert_eq!(limiter.remaining(id), 0);
        }
        assert_eq!(limiter.tracked(), 0);
    }

    #[test]
    fn test_identifiers_are_independent() {
        let limiter = WindowRateLimiter::new(1, Duration::from_secs(60));

        assert!(limiter.check_limit("alice"));
        assert!(!limiter.check_limit("alice"));

        assert_eq!(limiter.remaining("bob"), 1);
        assert!(limiter.check_limit("bob"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_is_read_only() {
        let limiter = WindowRateLimiter::new(5, Duration::from_millis(100));
        limiter.check_limit("alice");
        limiter.check_limit("alice");

        assert_eq!(limiter.remaining("alice"), 3);
        assert_eq!(limiter.remaining("alice"), 3);

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(limiter.remaining("alice"), 5);
        // Expired entries are still stored until the next check or sweep.
        assert_eq!(limiter.tracked(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_at_tracks_oldest_entry() {
        let limiter = WindowRateLimiter::new(3, Duration::from_millis(1000));
        assert!(limiter.reset_at("alice").is_none());
        assert_eq!(limiter.retry_after("alice"), Duration::ZERO);

        let first = Instant::now();
        limiter.check_limit("alice");
        tokio::time::advance(Duration::from_millis(300)).await;
        limiter.check_limit("alice");

        assert_eq!(limiter.reset_at("alice"), Some(first + Duration::from_millis(1000)));
        assert_eq!(limiter.retry_after("alice"), Duration::from_millis(700));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_windows_are_collected() {
        let limiter = WindowRateLimiter::new(1, Duration::from_millis(100));
        limiter.check_limit("alice");
        limiter.check_limit("bob");
        assert_eq!(limiter.tracked(), 2);

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(limiter.sweep(), 2);
        assert_eq!(limiter.tracked(), 0);
    }

    #[test]
    fn test_concurrent_checks_never_exceed_quota() {
        let limiter = Arc::new(WindowRateLimiter::new(50, Duration::from_secs(60)));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || (0..20).filter(|_| limiter.check_limit("shared")).count())
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 50);
    }
}
