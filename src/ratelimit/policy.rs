//! Named rate limit policies.

use std::collections::BTreeMap;
use std::sync::RwLock;
use std::time::Duration;

use serde::Deserialize;

/// An attempt ceiling over a rolling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RatePolicy {
    /// Attempts allowed inside the window.
    pub max_attempts: usize,
    /// Window length in seconds.
    pub window_seconds: u64,
}

impl RatePolicy {
    pub const fn new(max_attempts: usize, window_seconds: u64) -> Self {
        Self {
            max_attempts,
            window_seconds,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }

    pub fn window_ms(&self) -> u64 {
        self.window_seconds.saturating_mul(1_000)
    }
}

/// Built-in policies, merged beneath any configured ones.
pub fn default_policies() -> BTreeMap<String, RatePolicy> {
    BTreeMap::from([
        ("login".to_string(), RatePolicy::new(5, 3_600)),
        ("token_verify".to_string(), RatePolicy::new(10, 900)),
        ("scan".to_string(), RatePolicy::new(10, 900)),
        ("upload".to_string(), RatePolicy::new(20, 3_600)),
    ])
}

/// Policy table shared with command handlers, replaceable on reload.
#[derive(Debug, Default)]
pub struct PolicyTable {
    policies: RwLock<BTreeMap<String, RatePolicy>>,
}

impl PolicyTable {
    pub fn new(policies: BTreeMap<String, RatePolicy>) -> Self {
        Self {
            policies: RwLock::new(policies),
        }
    }

    /// Look up a policy by name.
    pub fn get(&self, name: &str) -> Option<RatePolicy> {
        self.policies
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .copied()
    }

    /// Swap in a new set of policies.
    pub fn replace(&self, policies: BTreeMap<String, RatePolicy>) {
        *self.policies.write().unwrap_or_else(|e| e.into_inner()) = policies;
    }

    /// Names of all configured policies.
    pub fn names(&self) -> Vec<String> {
        self.policies
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }
}
