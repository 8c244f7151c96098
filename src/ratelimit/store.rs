//! Storage for per-key attempt windows.

use std::collections::{HashMap, VecDeque};

/// Attempt timestamps recorded for one key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateWindow {
    /// Ascending attempt times in clock milliseconds.
    timestamps: VecDeque<u64>,
    /// Longest horizon used with this key. Lets the sweep prune it.
    window_ms: u64,
}

impl RateWindow {
    /// Number of attempts currently held.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Oldest recorded attempt.
    pub fn oldest(&self) -> Option<u64> {
        self.timestamps.front().copied()
    }

    /// Most recent recorded attempt.
    pub fn newest(&self) -> Option<u64> {
        self.timestamps.back().copied()
    }

    /// Longest horizon any caller has used with this key.
    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Attempts made within the last `window_ms`.
    pub fn live_count(&self, now_ms: u64, window_ms: u64) -> usize {
        self.timestamps
            .iter()
            .rev()
            .take_while(|&&ts| now_ms.saturating_sub(ts) < window_ms)
            .count()
    }

    /// Oldest attempt still inside the last `window_ms`.
    pub fn oldest_live(&self, now_ms: u64, window_ms: u64) -> Option<u64> {
        self.timestamps
            .iter()
            .copied()
            .find(|&ts| now_ms.saturating_sub(ts) < window_ms)
    }

    /// Widen the horizon to `window_ms` if it is longer, then drop attempts
    /// older than the horizon. A shorter window never shrinks it.
    fn prune(&mut self, now_ms: u64, window_ms: u64) {
        self.window_ms = self.window_ms.max(window_ms);
        let horizon = self.window_ms;
        while let Some(&ts) = self.timestamps.front() {
            if now_ms.saturating_sub(ts) < horizon {
                break;
            }
            self.timestamps.pop_front();
        }
    }
}

/// Backing store for [`RateLimiter`](super::RateLimiter).
///
/// The limiter serializes all calls, so implementations need no locking of
/// their own. A networked store for multi-replica deployments would
/// implement the same trait.
pub trait RateLimiterStore: Send {
    /// Snapshot of the window for `key`, if any.
    fn get(&self, key: &str) -> Option<RateWindow>;

    /// Drop attempts past the key's horizon and return how many fall
    /// within `window_ms`.
    fn prune(&mut self, key: &str, now_ms: u64, window_ms: u64) -> usize;

    /// Record an attempt at `now_ms`, creating the window if needed.
    fn append(&mut self, key: &str, now_ms: u64, window_ms: u64);

    /// Remove the window for `key`. Returns whether one existed.
    fn remove(&mut self, key: &str) -> bool;

    /// Prune every window and drop the empty ones. Returns the number dropped.
    fn sweep(&mut self, now_ms: u64) -> usize;

    /// Number of keys with a window.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local store. State is lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    windows: HashMap<String, RateWindow>,
    /// Upper bound on distinct keys. `None` means unbounded.
    max_keys: Option<usize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding at most `max_keys` distinct keys.
    pub fn with_max_keys(max_keys: usize) -> Self {
        Self {
            windows: HashMap::new(),
            max_keys: Some(max_keys),
        }
    }

    /// Make room for one new key.
    ///
    /// Sweeps first; if still full, evicts the key whose latest attempt is
    /// the oldest.
    fn make_room(&mut self, now_ms: u64) {
        let Some(max_keys) = self.max_keys else {
            return;
        };
        if self.windows.len() < max_keys {
            return;
        }

        self.sweep(now_ms);

        while self.windows.len() >= max_keys.max(1) {
            let stalest = self
                .windows
                .iter()
                .min_by_key(|(_, w)| w.newest().unwrap_or(0))
                .map(|(k, _)| k.clone());
            match stalest {
                Some(key) => {
                    self.windows.remove(&key);
                }
                None => break,
            }
        }
    }
}

impl RateLimiterStore for InMemoryStore {
    fn get(&self, key: &str) -> Option<RateWindow> {
        self.windows.get(key).cloned()
    }

    fn prune(&mut self, key: &str, now_ms: u64, window_ms: u64) -> usize {
        match self.windows.get_mut(key) {
            Some(window) => {
                window.prune(now_ms, window_ms);
                window.live_count(now_ms, window_ms)
            }
            None => 0,
        }
    }

    fn append(&mut self, key: &str, now_ms: u64, window_ms: u64) {
        if !self.windows.contains_key(key) {
            self.make_room(now_ms);
        }
        let window = self.windows.entry(key.to_string()).or_default();
        window.window_ms = window.window_ms.max(window_ms);
        window.timestamps.push_back(now_ms);
    }

    fn remove(&mut self, key: &str) -> bool {
        self.windows.remove(key).is_some()
    }

    fn sweep(&mut self, now_ms: u64) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, window| {
            let horizon = window.window_ms;
            window.prune(now_ms, horizon);
            !window.is_empty()
        });
        before - self.windows.len()
    }

    fn len(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prune_unknown_key() {
        let mut store = InMemoryStore::new();
        assert_eq!(store.prune("nobody", 1_000, 100), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_append_and_prune() {
        let mut store = InMemoryStore::new();
        store.append("k", 0, 1_000);
        store.append("k", 500, 1_000);
        store.append("k", 900, 1_000);

        assert_eq!(store.prune("k", 999, 1_000), 3);
        // Entry at 0 expires exactly at 1000
        assert_eq!(store.prune("k", 1_000, 1_000), 2);
        assert_eq!(store.get("k").unwrap().oldest(), Some(500));
        assert_eq!(store.prune("k", 1_900, 1_000), 0);
    }

    #[test]
    fn test_shorter_window_keeps_longer_horizon() {
        let mut store = InMemoryStore::new();
        store.append("k", 0, 60_000);
        store.append("k", 1_500, 60_000);

        // Only the attempt at 1500 is inside a 1s window, but both stay.
        assert_eq!(store.prune("k", 2_000, 1_000), 1);
        assert_eq!(store.get("k").unwrap().len(), 2);
        assert_eq!(store.get("k").unwrap().window_ms(), 60_000);

        store.append("k", 2_000, 1_000);
        assert_eq!(store.get("k").unwrap().window_ms(), 60_000);
        assert_eq!(store.sweep(30_000), 0);
    }

    #[test]
    fn test_remove() {
        let mut store = InMemoryStore::new();
        store.append("k", 0, 1_000);
        assert!(store.remove("k"));
        assert!(!store.remove("k"));
        assert!(store.get("k").is_none());
    }

    #[test]
    fn test_sweep_drops_expired_windows() {
        let mut store = InMemoryStore::new();
        store.append("short", 0, 100);
        store.append("long", 0, 10_000);

        assert_eq!(store.sweep(500), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get("long").is_some());
    }

    #[test]
    fn test_capacity_evicts_stalest_key() {
        let mut store = InMemoryStore::with_max_keys(2);
        store.append("a", 10, 60_000);
        store.append("b", 20, 60_000);
        store.append("a", 30, 60_000);

        // "b" was last seen at 20, "a" at 30
        store.append("c", 40, 60_000);
        assert_eq!(store.len(), 2);
        assert!(store.get("a").is_some());
        assert!(store.get("b").is_none());
        assert!(store.get("c").is_some());
    }

    #[test]
    fn test_capacity_prefers_sweeping() {
        let mut store = InMemoryStore::with_max_keys(2);
        store.append("old", 0, 100);
        store.append("live", 0, 60_000);

        store.append("new", 1_000, 60_000);
        assert_eq!(store.len(), 2);
        assert!(store.get("old").is_none());
        assert!(store.get("live").is_some());
    }

    #[test]
    fn test_existing_key_never_evicted_for_itself() {
        let mut store = InMemoryStore::with_max_keys(1);
        store.append("only", 0, 60_000);
        store.append("only", 10, 60_000);
        assert_eq!(store.get("only").unwrap().len(), 2);
    }
}
