//! Rate limit commands for the web application's own throttled paths.
//!
//! `check` and `remaining` take the limit either as a named `policy` or as
//! explicit `max` and `window_ms`.

mod check;
mod remaining;
mod reset;

pub use check::CheckRateCommand;
pub use remaining::RemainingRateCommand;
pub use reset::ResetRateCommand;

use crate::error::{GuardError, ValidationErrorKind};
use crate::ratelimit::PolicyTable;
use crate::validation::validate_limit;

use super::types::CommandParams;

/// Resolve the `(max, window_ms)` a request asks for.
///
/// A named policy wins when both forms are given.
fn resolve_limit(params: &CommandParams, policies: &PolicyTable) -> Result<(usize, u64), GuardError> {
    if let Some(name) = params.get_optional_str("policy") {
        let policy = policies.get(name).ok_or_else(|| GuardError::Validation {
            kind: ValidationErrorKind::UnknownPolicy {
                name: name.to_string(),
            },
        })?;
        return Ok((policy.max_attempts, policy.window_ms()));
    }

    if !params.has("max") && !params.has("window_ms") {
        return Err(GuardError::Validation {
            kind: ValidationErrorKind::MissingParameter {
                param: "policy".to_string(),
            },
        });
    }

    validate_limit(params.get_i64("max")?, params.get_i64("window_ms")?)
}
