//! Configuration settings for the scanguard daemon.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::GuardError;
use crate::ratelimit::{default_policies, RatePolicy};

/// Main configuration structure for the daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Deployment environment. Decides whether a missing secret is fatal.
    #[serde(default)]
    pub environment: Environment,
    pub socket: SocketConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    /// Named rate limit policies (e.g. `login`, `scan`).
    #[serde(default)]
    pub policies: BTreeMap<String, RatePolicy>,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Development,
}

/// Socket configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SocketConfig {
    /// Path to the Unix socket file.
    pub path: PathBuf,
    /// Socket file permissions (e.g., "0660").
    #[serde(default = "default_socket_permissions")]
    pub permissions: String,
    /// Socket file owner.
    #[serde(default = "default_owner")]
    pub owner: String,
    /// Socket file group.
    #[serde(default = "default_group")]
    pub group: String,
}

/// Security configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Optional path to a file holding the token secret.
    #[serde(default)]
    pub token_secret_path: Option<PathBuf>,
    /// Environment variable consulted first for the token secret.
    #[serde(default = "default_token_secret_env")]
    pub token_secret_env: String,
    /// List of allowed peer UIDs.
    #[serde(default)]
    pub allowed_peer_uids: Vec<u32>,
    /// Request budget per peer UID.
    #[serde(default = "default_peer_rate_limit")]
    pub peer_rate_limit: RatePolicy,
}

/// Limits configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum message size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Maximum concurrent connections.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    /// Socket read/write timeout in seconds.
    #[serde(default = "default_socket_timeout")]
    pub socket_timeout_seconds: u64,
    /// Maximum distinct rate limit keys held in memory.
    #[serde(default = "default_max_tracked_keys")]
    pub max_tracked_keys: usize,
    /// Interval between sweeps of stale rate limit windows.
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format ("pretty" or "json").
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Audit logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Whether audit logging is enabled.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Path to the audit log file.
    #[serde(default = "default_audit_log_path")]
    pub log_path: PathBuf,
}

// Default value functions
fn default_socket_permissions() -> String {
    "0660".to_string()
}

fn default_owner() -> String {
    "root".to_string()
}

fn default_group() -> String {
    "www-data".to_string()
}

fn default_token_secret_env() -> String {
    "SCANGUARD_TOKEN_SECRET".to_string()
}

fn default_peer_rate_limit() -> RatePolicy {
    RatePolicy::new(600, 60)
}

fn default_max_message_size() -> usize {
    65_536
}

fn default_max_concurrent() -> usize {
    100
}

fn default_socket_timeout() -> u64 {
    30
}

fn default_max_tracked_keys() -> usize {
    100_000
}

fn default_cleanup_interval() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_audit_enabled() -> bool {
    true
}

fn default_audit_log_path() -> PathBuf {
    PathBuf::from("/var/log/scanguard/audit.log")
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            token_secret_path: None,
            token_secret_env: default_token_secret_env(),
            allowed_peer_uids: Vec::new(),
            peer_rate_limit: default_peer_rate_limit(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_message_size: default_max_message_size(),
            max_concurrent_requests: default_max_concurrent(),
            socket_timeout_seconds: default_socket_timeout(),
            max_tracked_keys: default_max_tracked_keys(),
            cleanup_interval_seconds: default_cleanup_interval(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            log_path: default_audit_log_path(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, GuardError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| GuardError::Config {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            GuardError::Config { message } => GuardError::Config {
                message: format!("{} ({})", message, path.display()),
            },
            other => other,
        })
    }

    /// Parse and validate settings from TOML text.
    ///
    /// Built-in rate limit policies are filled in beneath configured ones.
    pub fn from_toml(content: &str) -> Result<Self, GuardError> {
        let mut settings: Settings = toml::from_str(content).map_err(|e| GuardError::Config {
            message: format!("Failed to parse config: {}", e),
        })?;

        for (name, policy) in default_policies() {
            settings.policies.entry(name).or_insert(policy);
        }

        settings.validate()?;

        Ok(settings)
    }

    /// Validate the settings.
    fn validate(&self) -> Result<(), GuardError> {
        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(GuardError::Config {
                message: format!(
                    "Invalid log level '{}'. Valid levels: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        // Validate log format
        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(GuardError::Config {
                message: format!(
                    "Invalid log format '{}'. Valid formats: {:?}",
                    self.logging.format, valid_formats
                ),
            });
        }

        // Validate socket permissions format
        if !self.socket.permissions.chars().all(|c| c.is_ascii_digit()) {
            return Err(GuardError::Config {
                message: format!(
                    "Invalid socket permissions '{}'. Must be octal (e.g., '0660')",
                    self.socket.permissions
                ),
            });
        }

        let named = self.policies.iter().map(|(name, p)| (name.as_str(), p));
        let peer = std::iter::once(("peer_rate_limit", &self.security.peer_rate_limit));
        for (name, policy) in named.chain(peer) {
            if policy.window_seconds == 0 {
                return Err(GuardError::Config {
                    message: format!("Rate limit policy '{}' has a zero-length window", name),
                });
            }
        }

        if self.limits.max_tracked_keys == 0 {
            return Err(GuardError::Config {
                message: "limits.max_tracked_keys must be at least 1".to_string(),
            });
        }

        if self.limits.cleanup_interval_seconds == 0 {
            return Err(GuardError::Config {
                message: "limits.cleanup_interval_seconds must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[socket]
path = "/run/scanguard/scanguard.sock"
"#;

    #[test]
    fn test_default_values() {
        assert_eq!(default_socket_permissions(), "0660");
        assert_eq!(default_log_level(), "info");
        assert_eq!(default_log_format(), "pretty");
        assert_eq!(default_token_secret_env(), "SCANGUARD_TOKEN_SECRET");
    }

    #[test]
    fn test_minimal_config() {
        let settings = Settings::from_toml(MINIMAL).unwrap();
        assert_eq!(settings.environment, Environment::Production);
        assert_eq!(settings.socket.permissions, "0660");
        assert!(settings.security.token_secret_path.is_none());
        assert!(settings.security.allowed_peer_uids.is_empty());
        assert_eq!(settings.policies["login"], RatePolicy::new(5, 3_600));
        assert_eq!(settings.policies["scan"], RatePolicy::new(10, 900));
        assert!(settings.audit.enabled);
    }

    #[test]
    fn test_full_config() {
        let settings = Settings::from_toml(
            r#"
environment = "development"

[socket]
path = "/tmp/scanguard.sock"
permissions = "0600"

[security]
token_secret_path = "/etc/scanguard/token.key"
allowed_peer_uids = [33, 1000]
peer_rate_limit = { max_attempts = 50, window_seconds = 10 }

[policies.login]
max_attempts = 3
window_seconds = 600

[policies.ppdb_upload]
max_attempts = 4
window_seconds = 3600

[limits]
max_tracked_keys = 500

[logging]
level = "debug"
format = "json"

[audit]
enabled = false
"#,
        )
        .unwrap();

        assert_eq!(settings.environment, Environment::Development);
        assert_eq!(settings.security.allowed_peer_uids, vec![33, 1000]);
        assert_eq!(settings.security.peer_rate_limit, RatePolicy::new(50, 10));
        // Configured entry overrides the built-in one
        assert_eq!(settings.policies["login"], RatePolicy::new(3, 600));
        assert_eq!(settings.policies["ppdb_upload"], RatePolicy::new(4, 3_600));
        // Built-ins still present
        assert!(settings.policies.contains_key("token_verify"));
        assert_eq!(settings.limits.max_tracked_keys, 500);
        assert_eq!(settings.limits.socket_timeout_seconds, 30);
        assert!(!settings.audit.enabled);
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let toml = format!("{}\n[logging]\nlevel = \"loud\"\n", MINIMAL);
        assert!(matches!(
            Settings::from_toml(&toml),
            Err(GuardError::Config { .. })
        ));
    }

    #[test]
    fn test_zero_window_rejected() {
        let toml = format!(
            "{}\n[policies.login]\nmax_attempts = 5\nwindow_seconds = 0\n",
            MINIMAL
        );
        let err = Settings::from_toml(&toml).unwrap_err();
        assert!(err.to_string().contains("login"));
    }

    #[test]
    fn test_unknown_environment_rejected() {
        let toml = format!("environment = \"staging\"\n{}", MINIMAL);
        assert!(Settings::from_toml(&toml).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = Settings::load("/nonexistent/scanguard.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
