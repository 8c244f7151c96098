//! Sliding window rate limiting.
//!
//! One process-wide [`RateLimiter`] throttles every sensitive path (login,
//! token verification, scans, uploads, and peer requests to the daemon).
//! Keys are opaque strings, conventionally `"<action>:<client>"`.
//!
//! State is per process. With several replicas an attacker faces
//! `max * replicas` attempts.

mod clock;
mod limiter;
mod policy;
mod store;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use limiter::{RateDecision, RateLimiter};
pub use policy::{default_policies, PolicyTable, RatePolicy};
pub use store::{InMemoryStore, RateLimiterStore, RateWindow};
