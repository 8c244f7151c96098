//! Scrubbing of command parameters before they reach the audit log.
//!
//! A scan payload is a bearer credential for as long as the secret is
//! unchanged, so it is redacted alongside secret-looking keys.

use serde_json::{Map, Value};

/// Key fragments whose values are never written.
const SENSITIVE_KEYS: &[&str] = &[
    "payload",
    "token",
    "secret",
    "password",
    "credential",
    "private_key",
    "api_key",
    "auth",
];

/// Strings longer than this are replaced with their length.
const MAX_STRING_LENGTH: usize = 512;

const REDACTED: &str = "[REDACTED]";

/// Return a copy of `params` safe to write to the audit log.
pub fn sanitize_params(params: &Value) -> Value {
    match params {
        Value::Object(map) => {
            let sanitized: Map<String, Value> = map
                .iter()
                .map(|(key, value)| {
                    let value = if is_sensitive(key) {
                        Value::String(REDACTED.to_string())
                    } else {
                        sanitize_params(value)
                    };
                    (key.clone(), value)
                })
                .collect();
            Value::Object(sanitized)
        }
        Value::Array(items) => Value::Array(items.iter().map(sanitize_params).collect()),
        Value::String(s) if s.len() > MAX_STRING_LENGTH => {
            Value::String(format!("[TRUNCATED - {} bytes]", s.len()))
        }
        other => other.clone(),
    }
}

fn is_sensitive(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEYS.iter().any(|s| key.contains(s))
}
