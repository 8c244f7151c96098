//! Command types: parameters, results, and execution context.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::PeerInfo;
use crate::error::{GuardError, ValidationErrorKind};

/// Wrapper around command parameters with typed accessors.
#[derive(Debug, Clone)]
pub struct CommandParams {
    inner: serde_json::Value,
}

impl CommandParams {
    pub fn new(value: serde_json::Value) -> Self {
        Self { inner: value }
    }

    /// Borrow a required string parameter.
    pub fn get_str(&self, key: &str) -> Result<&str, GuardError> {
        self.inner
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| missing(key))
    }

    /// Borrow an optional string parameter.
    pub fn get_optional_str(&self, key: &str) -> Option<&str> {
        self.inner.get(key).and_then(|v| v.as_str())
    }

    /// Get a required integer parameter.
    pub fn get_i64(&self, key: &str) -> Result<i64, GuardError> {
        self.inner
            .get(key)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| missing(key))
    }

    /// Whether a parameter is present (with any value).
    pub fn has(&self, key: &str) -> bool {
        self.inner.get(key).is_some()
    }

    /// Require that a string parameter exists (for validation).
    pub fn require_string(&self, key: &str) -> Result<(), GuardError> {
        self.get_str(key).map(|_| ())
    }
}

fn missing(key: &str) -> GuardError {
    GuardError::Validation {
        kind: ValidationErrorKind::MissingParameter {
            param: key.to_string(),
        },
    }
}

impl From<serde_json::Value> for CommandParams {
    fn from(value: serde_json::Value) -> Self {
        Self::new(value)
    }
}

/// Result of command execution.
///
/// Expected rejections (rate limited, invalid scan) are failures here rather
/// than errors, so they keep their own code and details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<serde_json::Value>,
}

impl CommandResult {
    /// Create a success result with data.
    pub fn success(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error_code: None,
            error_message: None,
            error_details: None,
        }
    }

    /// Create a failure result.
    pub fn failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error_code: Some(code.into()),
            error_message: Some(message.into()),
            error_details: None,
        }
    }

    /// Create a failure result with structured details for the client.
    pub fn failure_with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error_details: Some(details),
            ..Self::failure(code, message)
        }
    }
}

/// Execution context for a command.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Unique identifier for this request.
    pub request_id: Uuid,
    /// The authenticated peer.
    pub peer: PeerInfo,
    /// Unix timestamp (seconds) when the request was received.
    pub timestamp: u64,
    /// The command being executed.
    pub command: String,
}

impl ExecutionContext {
    pub fn new(request_id: Uuid, peer: PeerInfo, timestamp: u64, command: String) -> Self {
        Self {
            request_id,
            peer,
            timestamp,
            command,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_str() {
        let params = CommandParams::new(serde_json::json!({
            "entity_id": "student-42",
            "max": 5
        }));

        assert_eq!(params.get_str("entity_id").unwrap(), "student-42");
        assert!(params.get_str("max").is_err());
        assert!(matches!(
            params.get_str("missing"),
            Err(GuardError::Validation {
                kind: ValidationErrorKind::MissingParameter { .. }
            })
        ));
    }

    #[test]
    fn test_optional_and_integers() {
        let params = CommandParams::new(serde_json::json!({"policy": "login", "max": 5}));

        assert_eq!(params.get_optional_str("policy"), Some("login"));
        assert_eq!(params.get_optional_str("key"), None);
        assert_eq!(params.get_i64("max").unwrap(), 5);
        assert!(params.has("max"));
        assert!(!params.has("window_ms"));
    }

    #[test]
    fn test_failure_with_details() {
        let result = CommandResult::failure_with_details(
            "RATE_LIMITED",
            "over limit",
            serde_json::json!({"retry_after_ms": 10}),
        );
        assert!(!result.success);
        assert_eq!(result.error_code.as_deref(), Some("RATE_LIMITED"));
        assert_eq!(result.error_details.unwrap()["retry_after_ms"], 10);
    }
}
