//! Input validation module.
//!
//! Validates parameters arriving over the socket before they reach the
//! token codec or the rate limiter.

mod identifiers;
mod limits;

pub use identifiers::{
    validate_caller_key, validate_entity_id, validate_rate_key, MAX_ENTITY_ID_LENGTH,
    MAX_RATE_KEY_LENGTH,
};
pub use limits::{validate_limit, MAX_ATTEMPTS, MAX_WINDOW_MS};
