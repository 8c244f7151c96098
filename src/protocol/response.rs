//! Response types for the scanguard protocol.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Client-facing message for an error code.
///
/// Internal detail stays in the server log; clients only ever see these.
fn client_message(code: &str) -> &'static str {
    match code {
        "AUTH_ERROR" => "Authentication failed",
        "VALIDATION_ERROR" => "Invalid request parameters",
        "COMMAND_ERROR" => "Command execution failed",
        "EXECUTION_ERROR" => "Internal execution error",
        "INTERNAL_ERROR" => "Internal server error",
        "RATE_LIMITED" => "Too many requests",
        "INVALID_SCAN" => "Invalid QR code",
        "CONNECTION_TIMEOUT" => "Connection timed out",
        _ => "An error occurred",
    }
}

/// A response from the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Whether the request succeeded.
    pub success: bool,

    /// Unique identifier for this request/response pair.
    pub request_id: Uuid,

    /// Response data on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Error details on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

/// Error details in a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g. "RATE_LIMITED", "INVALID_SCAN").
    pub code: String,

    /// Client-facing message.
    pub message: String,

    /// Structured details such as `retry_after_ms`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl Response {
    /// Create a success response with a specific request ID.
    pub fn success_with_id(request_id: Uuid, data: serde_json::Value) -> Self {
        Self {
            success: true,
            request_id,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response with a specific request ID.
    ///
    /// `message` is logged at debug level and replaced by the generic
    /// message for `code` before it reaches the client.
    pub fn error_with_id(
        request_id: Uuid,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::build_error(request_id, code.into(), message.into(), None)
    }

    /// Create an error response carrying structured details.
    pub fn error_with_details(
        request_id: Uuid,
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self::build_error(request_id, code.into(), message.into(), Some(details))
    }

    fn build_error(
        request_id: Uuid,
        code: String,
        original: String,
        details: Option<serde_json::Value>,
    ) -> Self {
        debug!(
            request_id = %request_id,
            code = %code,
            message = %original,
            "Error response (sanitized for client)"
        );

        let message = client_message(&code).to_string();
        Self {
            success: false,
            request_id,
            data: None,
            error: Some(ErrorResponse {
                code,
                message,
                details,
            }),
        }
    }

    /// Error code, if this is an error response.
    pub fn error_code(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.code.as_str())
    }
}
