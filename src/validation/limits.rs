//! Bounds on caller-supplied rate limit parameters.
//!
//! The limiter itself accepts any values; these bounds apply only to limits
//! arriving over the socket.

use crate::error::{GuardError, ValidationErrorKind};

/// Longest window a caller may request (7 days).
pub const MAX_WINDOW_MS: u64 = 7 * 24 * 60 * 60 * 1_000;

/// Highest attempt ceiling a caller may request.
pub const MAX_ATTEMPTS: u64 = 100_000;

/// Validate an explicit `(max, window_ms)` pair.
pub fn validate_limit(max: i64, window_ms: i64) -> Result<(usize, u64), GuardError> {
    let max = u64::try_from(max)
        .ok()
        .filter(|m| *m <= MAX_ATTEMPTS)
        .ok_or_else(|| invalid("max", format!("must be between 0 and {}", MAX_ATTEMPTS)))?;

    let window_ms = u64::try_from(window_ms)
        .ok()
        .filter(|w| (1..=MAX_WINDOW_MS).contains(w))
        .ok_or_else(|| invalid("window_ms", format!("must be between 1 and {}", MAX_WINDOW_MS)))?;

    let max = usize::try_from(max).map_err(|_| invalid("max", "out of range".to_string()))?;
    Ok((max, window_ms))
}

fn invalid(param: &str, message: String) -> GuardError {
    GuardError::Validation {
        kind: ValidationErrorKind::InvalidParameter {
            param: param.to_string(),
            message,
        },
    }
}
