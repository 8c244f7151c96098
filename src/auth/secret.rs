//! Token secret resolution.
//!
//! Lookup order: the configured environment variable, then the configured
//! secret file. With neither present, production refuses to start while
//! development falls back to a fixed, publicly known secret with a warning.

use std::path::Path;

use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::config::{Environment, SecurityConfig};
use crate::error::{AuthErrorKind, GuardError};

/// Minimum secret length accepted in production, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

const DEVELOPMENT_SECRET: &[u8] = b"scanguard-development-secret-not-for-production";

/// Where the token secret came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    Environment(String),
    File(std::path::PathBuf),
    DevelopmentFallback,
}

/// The process-wide token secret. Zeroed on drop.
pub struct TokenSecret {
    bytes: Zeroizing<Vec<u8>>,
    source: SecretSource,
}

impl TokenSecret {
    pub fn new(bytes: Vec<u8>, source: SecretSource) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
            source,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn source(&self) -> &SecretSource {
        &self.source
    }
}

impl std::fmt::Debug for TokenSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSecret")
            .field("len", &self.bytes.len())
            .field("source", &self.source)
            .finish()
    }
}

/// Resolve the token secret from the process environment and config.
pub fn resolve_token_secret(
    security: &SecurityConfig,
    environment: Environment,
) -> Result<TokenSecret, GuardError> {
    resolve_token_secret_with(security, environment, |name| std::env::var(name).ok())
}

/// Resolve the token secret with an injectable environment lookup.
pub fn resolve_token_secret_with<F>(
    security: &SecurityConfig,
    environment: Environment,
    lookup_env: F,
) -> Result<TokenSecret, GuardError>
where
    F: Fn(&str) -> Option<String>,
{
    let secret = if let Some(value) = lookup_env(&security.token_secret_env)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
    {
        TokenSecret::new(
            value.into_bytes(),
            SecretSource::Environment(security.token_secret_env.clone()),
        )
    } else if let Some(path) = &security.token_secret_path {
        TokenSecret::new(load_secret_file(path)?, SecretSource::File(path.clone()))
    } else if environment == Environment::Development {
        warn!("==============================================================");
        warn!(
            env = %security.token_secret_env,
            "NO TOKEN SECRET CONFIGURED: using the built-in development secret. \
             Cards issued now are forgeable by anyone with the source code."
        );
        warn!("==============================================================");
        return Ok(TokenSecret::new(
            DEVELOPMENT_SECRET.to_vec(),
            SecretSource::DevelopmentFallback,
        ));
    } else {
        return Err(secret_error(format!(
            "no token secret configured: set {} or security.token_secret_path",
            security.token_secret_env
        )));
    };

    if secret.as_bytes().len() < MIN_SECRET_LEN {
        if environment == Environment::Production {
            return Err(secret_error(format!(
                "token secret is {} bytes, production requires at least {}",
                secret.as_bytes().len(),
                MIN_SECRET_LEN
            )));
        }
        warn!(
            len = secret.as_bytes().len(),
            min = MIN_SECRET_LEN,
            "Token secret is shorter than recommended"
        );
    }

    info!(source = ?secret.source(), "Token secret loaded");
    Ok(secret)
}

/// Load a secret from a file.
///
/// The file must not be readable by group or others. Surrounding whitespace
/// is stripped so a trailing newline does not become part of the key.
pub fn load_secret_file(path: &Path) -> Result<Vec<u8>, GuardError> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        secret_error(format!(
            "Failed to read token secret metadata from {}: {}",
            path.display(),
            e
        ))
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(secret_error(format!(
                "Token secret file {} has insecure permissions {:04o}, expected 0600 or 0400",
                path.display(),
                mode & 0o777
            )));
        }
    }
    #[cfg(not(unix))]
    let _ = metadata;

    let raw = Zeroizing::new(std::fs::read(path).map_err(|e| {
        secret_error(format!(
            "Failed to read token secret from {}: {}",
            path.display(),
            e
        ))
    })?);

    let trimmed = raw.trim_ascii();
    if trimmed.is_empty() {
        return Err(secret_error(format!(
            "Token secret file {} is empty",
            path.display()
        )));
    }
    Ok(trimmed.to_vec())
}

fn secret_error(message: String) -> GuardError {
    GuardError::Auth {
        kind: AuthErrorKind::SecretUnavailable { message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    const LONG_SECRET: &str = "0123456789abcdef0123456789abcdef-long-enough";

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn write_secret(dir: &TempDir, content: &str, mode: u32) -> std::path::PathBuf {
        let path = dir.path().join("token.key");
        std::fs::write(&path, content).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[test]
    fn test_environment_variable_wins() {
        let dir = TempDir::new().unwrap();
        let security = SecurityConfig {
            token_secret_path: Some(write_secret(&dir, "file-secret-file-secret-file-secret", 0o600)),
            ..SecurityConfig::default()
        };
        let secret = resolve_token_secret_with(
            &security,
            Environment::Production,
            env_of(&[("SCANGUARD_TOKEN_SECRET", LONG_SECRET)]),
        )
        .unwrap();

        assert_eq!(secret.as_bytes(), LONG_SECRET.as_bytes());
        assert_eq!(
            secret.source(),
            &SecretSource::Environment("SCANGUARD_TOKEN_SECRET".to_string())
        );
    }

    #[test]
    fn test_file_secret_trimmed() {
        let dir = TempDir::new().unwrap();
        let path = write_secret(&dir, &format!("{}\n", LONG_SECRET), 0o600);
        let security = SecurityConfig {
            token_secret_path: Some(path.clone()),
            ..SecurityConfig::default()
        };
        let secret =
            resolve_token_secret_with(&security, Environment::Production, env_of(&[])).unwrap();
        assert_eq!(secret.as_bytes(), LONG_SECRET.as_bytes());
        assert_eq!(secret.source(), &SecretSource::File(path));
    }

    #[test]
    fn test_insecure_file_permissions_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_secret(&dir, LONG_SECRET, 0o644);
        assert!(matches!(
            load_secret_file(&path),
            Err(GuardError::Auth {
                kind: AuthErrorKind::SecretUnavailable { .. }
            })
        ));
    }

    #[test]
    fn test_empty_file_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_secret(&dir, "  \n", 0o400);
        assert!(load_secret_file(&path).is_err());
    }

    #[test]
    fn test_missing_secret_fatal_in_production() {
        let err = resolve_token_secret_with(
            &SecurityConfig::default(),
            Environment::Production,
            env_of(&[]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("SCANGUARD_TOKEN_SECRET"));
    }

    #[test]
    fn test_blank_env_ignored() {
        assert!(resolve_token_secret_with(
            &SecurityConfig::default(),
            Environment::Production,
            env_of(&[("SCANGUARD_TOKEN_SECRET", "   ")]),
        )
        .is_err());
    }

    #[test]
    fn test_development_fallback() {
        let secret = resolve_token_secret_with(
            &SecurityConfig::default(),
            Environment::Development,
            env_of(&[]),
        )
        .unwrap();
        assert_eq!(secret.source(), &SecretSource::DevelopmentFallback);
        assert!(!secret.as_bytes().is_empty());
    }

    #[test]
    fn test_short_secret_rejected_in_production_only() {
        let env = env_of(&[("SCANGUARD_TOKEN_SECRET", "short")]);
        assert!(
            resolve_token_secret_with(&SecurityConfig::default(), Environment::Production, &env)
                .is_err()
        );
        assert!(
            resolve_token_secret_with(&SecurityConfig::default(), Environment::Development, &env)
                .is_ok()
        );
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let secret = TokenSecret::new(LONG_SECRET.as_bytes().to_vec(), SecretSource::DevelopmentFallback);
        let debug = format!("{:?}", secret);
        assert!(!debug.contains(LONG_SECRET));
        assert!(debug.contains("len"));
    }
}
