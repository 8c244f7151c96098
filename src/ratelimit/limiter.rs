//! Sliding window rate limiter keyed by arbitrary strings.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use super::clock::{Clock, MonotonicClock};
use super::policy::RatePolicy;
use super::store::{InMemoryStore, RateLimiterStore};

/// Outcome of [`RateLimiter::check_and_record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateDecision {
    /// Whether the attempt may proceed.
    pub allowed: bool,
    /// Attempts left in the current window after this one.
    pub remaining: usize,
    /// Milliseconds until the oldest recorded attempt leaves the window.
    /// Zero when allowed.
    pub retry_after_ms: u64,
}

/// A rolling-window attempt counter.
///
/// Each key may make at most `max` attempts within any `window_ms` span. An
/// attempt is forgotten exactly `window_ms` after it happened. Rejected
/// attempts are not recorded.
///
/// The limit and window are chosen per call, so one limiter serves every
/// policy. The check and the record happen under one lock.
pub struct RateLimiter<S = InMemoryStore> {
    store: Mutex<S>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter<InMemoryStore> {
    /// Create an unbounded in-memory limiter on the monotonic clock.
    pub fn new() -> Self {
        Self::with_store(InMemoryStore::new(), Arc::new(MonotonicClock::new()))
    }

    /// Create an in-memory limiter tracking at most `max_keys` keys.
    pub fn with_max_keys(max_keys: usize) -> Self {
        Self::with_store(
            InMemoryStore::with_max_keys(max_keys),
            Arc::new(MonotonicClock::new()),
        )
    }
}

impl Default for RateLimiter<InMemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: RateLimiterStore> RateLimiter<S> {
    /// Create a limiter over a given store and clock.
    pub fn with_store(store: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Mutex::new(store),
            clock,
        }
    }

    /// Check whether `key` may make another attempt, recording it if so.
    pub fn check_and_record(&self, key: &str, max: usize, window_ms: u64) -> RateDecision {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        let now = self.clock.now_ms();

        let count = store.prune(key, now, window_ms);

        if count >= max {
            let retry_after_ms = store
                .get(key)
                .and_then(|w| w.oldest_live(now, window_ms))
                .map(|oldest| oldest.saturating_add(window_ms).saturating_sub(now))
                .unwrap_or(0);
            debug!(key = %key, count, max, retry_after_ms, "Rate limit exceeded");
            return RateDecision {
                allowed: false,
                remaining: 0,
                retry_after_ms,
            };
        }

        store.append(key, now, window_ms);
        RateDecision {
            allowed: true,
            remaining: max - (count + 1),
            retry_after_ms: 0,
        }
    }

    /// Like [`check_and_record`](Self::check_and_record) with a named policy.
    pub fn check_policy(&self, key: &str, policy: &RatePolicy) -> RateDecision {
        self.check_and_record(key, policy.max_attempts, policy.window_ms())
    }

    /// Attempts left for `key` without recording one. Leaves the store
    /// untouched.
    pub fn remaining_attempts(&self, key: &str, max: usize, window_ms: u64) -> usize {
        let store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        let now = self.clock.now_ms();
        let used = store
            .get(key)
            .map(|w| w.live_count(now, window_ms))
            .unwrap_or(0);
        max.saturating_sub(used)
    }

    /// Clear the window for `key`. Returns whether one existed.
    pub fn reset(&self, key: &str) -> bool {
        self.store
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key)
    }

    /// Drop windows with no live attempts. Returns the number dropped.
    pub fn cleanup(&self) -> usize {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        let now = self.clock.now_ms();
        store.sweep(now)
    }

    /// Number of keys being tracked.
    pub fn tracked_keys(&self) -> usize {
        self.store.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl<S: RateLimiterStore + 'static> RateLimiter<S> {
    /// Start a background cleanup task.
    ///
    /// Spawns a tokio task that periodically sweeps stale windows so the
    /// key registry does not grow without bound.
    pub fn start_cleanup_task(self: &Arc<Self>, interval: Duration) {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);
            loop {
                interval_timer.tick().await;
                let dropped = limiter.cleanup();
                if dropped > 0 {
                    debug!(dropped, "Swept stale rate limit windows");
                }
            }
        });
    }
}

impl<S> std::fmt::Debug for RateLimiter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish_non_exhaustive()
    }
}
