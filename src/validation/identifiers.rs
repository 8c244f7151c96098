//! Entity id and rate limit key validation.
//!
//! Both end up in log lines and hashed token input, so they are kept short
//! and free of control characters.

use crate::error::{GuardError, ValidationErrorKind};

/// Maximum entity id length in bytes.
pub const MAX_ENTITY_ID_LENGTH: usize = 128;

/// Maximum rate limit key (or client id) length in bytes.
pub const MAX_RATE_KEY_LENGTH: usize = 256;

/// Validate an entity id (e.g. a student NIS) before issuing a card.
pub fn validate_entity_id(entity_id: &str) -> Result<&str, GuardError> {
    validate_identifier("entity_id", entity_id, MAX_ENTITY_ID_LENGTH)
}

/// Validate a rate limit key or client identifier.
pub fn validate_rate_key<'a>(param: &str, key: &'a str) -> Result<&'a str, GuardError> {
    validate_identifier(param, key, MAX_RATE_KEY_LENGTH)
}

/// Key prefixes the daemon keeps for its own throttles.
pub const RESERVED_KEY_PREFIXES: &[&str] = &["peer:", "scan:"];

/// Validate a key supplied to the `ratelimit.*` commands.
///
/// Keys under a reserved prefix belong to the daemon's own throttles and
/// cannot be checked, queried or reset by clients.
pub fn validate_caller_key<'a>(param: &str, key: &'a str) -> Result<&'a str, GuardError> {
    let key = validate_rate_key(param, key)?;
    if let Some(prefix) = RESERVED_KEY_PREFIXES
        .iter()
        .find(|p| key.trim_start().to_ascii_lowercase().starts_with(*p))
    {
        return Err(invalid(param, format!("prefix '{}' is reserved", prefix)));
    }
    Ok(key)
}

fn validate_identifier<'a>(param: &str, value: &'a str, max_len: usize) -> Result<&'a str, GuardError> {
    if value.trim().is_empty() {
        return Err(invalid(param, "must not be empty".to_string()));
    }

    if value.len() > max_len {
        return Err(invalid(
            param,
            format!("exceeds maximum length of {} bytes", max_len),
        ));
    }

    if value.chars().any(char::is_control) {
        return Err(invalid(param, "contains control characters".to_string()));
    }

    Ok(value)
}

fn invalid(param: &str, message: String) -> GuardError {
    GuardError::Validation {
        kind: ValidationErrorKind::InvalidParameter {
            param: param.to_string(),
            message,
        },
    }
}
