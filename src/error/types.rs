//! Error types for the scanguard daemon.

use thiserror::Error;

/// Main error type for the daemon.
///
/// The token codec and rate limiter never produce these; they report
/// rejection through plain return values. This covers the service around them.
#[derive(Error, Debug)]
pub enum GuardError {
    /// Configuration-related errors.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Socket-related errors.
    #[error("Socket error: {message}")]
    Socket { message: String },

    /// Authentication errors.
    #[error("Authentication error: {kind}")]
    Auth { kind: AuthErrorKind },

    /// Validation errors.
    #[error("Validation error: {kind}")]
    Validation { kind: ValidationErrorKind },

    /// Command dispatch errors.
    #[error("Command error: {kind}")]
    Command { kind: CommandErrorKind },

    /// Protocol errors.
    #[error("Protocol error: {kind}")]
    Protocol { kind: ProtocolErrorKind },

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Authentication error kinds.
#[derive(Error, Debug)]
pub enum AuthErrorKind {
    #[error("Unauthorized peer: UID {uid} not in allowed list")]
    UnauthorizedPeer { uid: u32 },

    #[error("Token secret unavailable: {message}")]
    SecretUnavailable { message: String },
}

/// Validation error kinds.
#[derive(Error, Debug)]
pub enum ValidationErrorKind {
    #[error("Missing required parameter: {param}")]
    MissingParameter { param: String },

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Unknown rate limit policy: {name}")]
    UnknownPolicy { name: String },
}

/// Command error kinds.
#[derive(Error, Debug)]
pub enum CommandErrorKind {
    #[error("Unknown command: {name}")]
    UnknownCommand { name: String },
}

/// Protocol error kinds.
#[derive(Error, Debug)]
pub enum ProtocolErrorKind {
    #[error("Message too large: {size} bytes exceeds maximum of {max} bytes")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Invalid message format: {message}")]
    InvalidMessageFormat { message: String },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Connection timed out")]
    ConnectionTimeout,
}

impl GuardError {
    /// Response code reported to clients for this error.
    pub fn code(&self) -> &'static str {
        match self {
            GuardError::Auth { .. } => "AUTH_ERROR",
            GuardError::Validation { .. } => "VALIDATION_ERROR",
            GuardError::Command { .. } => "COMMAND_ERROR",
            GuardError::Protocol {
                kind: ProtocolErrorKind::ConnectionTimeout,
            } => "CONNECTION_TIMEOUT",
            _ => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = GuardError::Validation {
            kind: ValidationErrorKind::MissingParameter {
                param: "entity_id".to_string(),
            },
        };
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let err = GuardError::Command {
            kind: CommandErrorKind::UnknownCommand {
                name: "nope".to_string(),
            },
        };
        assert_eq!(err.code(), "COMMAND_ERROR");

        let err = GuardError::Config {
            message: "bad".to_string(),
        };
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_error_display() {
        let err = GuardError::Validation {
            kind: ValidationErrorKind::UnknownPolicy {
                name: "sms".to_string(),
            },
        };
        assert_eq!(
            err.to_string(),
            "Validation error: Unknown rate limit policy: sms"
        );
    }
}
