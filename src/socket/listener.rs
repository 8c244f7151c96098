//! Unix socket listener.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UnixListener;
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, error, info, warn};

use crate::audit::AuditLogger;
use crate::commands::CommandRegistry;
use crate::config::Settings;
use crate::error::{GuardError, ProtocolErrorKind};
use crate::ratelimit::{PolicyTable, RateLimiter};
use crate::token::TokenCodec;

use super::connection::{handle_connection, ConnectionContext};

/// Request and connection counters.
#[derive(Debug, Default)]
pub struct ConnectionMetrics {
    requests_total: AtomicU64,
    requests_failed: AtomicU64,
    active_connections: AtomicUsize,
}

impl ConnectionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one answered request.
    pub fn record_request(&self, success: bool) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.requests_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn total_requests(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn failed_requests(&self) -> u64 {
        self.requests_failed.load(Ordering::Relaxed)
    }

    pub fn active(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Unix socket server.
pub struct SocketListener {
    listener: UnixListener,
    context: Arc<ConnectionContext>,
    connection_semaphore: Arc<Semaphore>,
}

impl SocketListener {
    /// Bind the socket and assemble the services behind it.
    ///
    /// Starts the rate limiters' background sweeps, so this must be called
    /// inside a tokio runtime.
    pub async fn bind(
        settings: Arc<Settings>,
        codec: Arc<TokenCodec>,
        policies: Arc<PolicyTable>,
    ) -> Result<Self, GuardError> {
        let socket_path = &settings.socket.path;

        prepare_socket_path(socket_path)?;

        let listener = UnixListener::bind(socket_path).map_err(|e| GuardError::Socket {
            message: format!("Failed to bind to socket {}: {}", socket_path.display(), e),
        })?;

        set_socket_permissions(socket_path, &settings.socket.permissions)?;
        apply_socket_ownership(socket_path, &settings.socket.owner, &settings.socket.group);

        let metrics = Arc::new(ConnectionMetrics::new());

        let connection_semaphore = Arc::new(Semaphore::new(settings.limits.max_concurrent_requests));
        info!(
            max_connections = settings.limits.max_concurrent_requests,
            "Connection limiting enabled"
        );

        let cleanup_interval = Duration::from_secs(settings.limits.cleanup_interval_seconds);
        let limiter = Arc::new(RateLimiter::with_max_keys(settings.limits.max_tracked_keys));
        limiter.start_cleanup_task(cleanup_interval);

        // Kept apart from the limiter the ratelimit.* commands can reach.
        let peer_limiter = Arc::new(RateLimiter::with_max_keys(settings.limits.max_tracked_keys));
        peer_limiter.start_cleanup_task(cleanup_interval);
        info!(
            max_tracked_keys = settings.limits.max_tracked_keys,
            peer_max = settings.security.peer_rate_limit.max_attempts,
            peer_window_seconds = settings.security.peer_rate_limit.window_seconds,
            "Rate limiters ready"
        );

        let registry = Arc::new(CommandRegistry::new(
            codec,
            limiter,
            policies,
            Some(Arc::clone(&metrics)),
        ));

        let audit_logger = open_audit_logger(&settings);

        info!(path = %socket_path.display(), "Socket listener bound");

        Ok(Self {
            listener,
            context: Arc::new(ConnectionContext {
                settings,
                registry,
                peer_limiter,
                metrics,
                audit_logger,
            }),
            connection_semaphore,
        })
    }

    pub fn metrics(&self) -> Arc<ConnectionMetrics> {
        Arc::clone(&self.context.metrics)
    }

    /// Accept connections until `shutdown` is notified.
    ///
    /// Connections already accepted keep running after this returns.
    pub async fn run(&self, shutdown: Arc<Notify>) -> Result<(), GuardError> {
        info!("Socket listener running, waiting for connections...");

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => self.spawn_connection(stream),
                        Err(e) => warn!(error = %e, "Failed to accept connection"),
                    }
                }
                _ = shutdown.notified() => {
                    info!("Shutdown signal received, stopping listener");
                    break;
                }
            }
        }

        Ok(())
    }

    fn spawn_connection(&self, stream: tokio::net::UnixStream) {
        let permit = match Arc::clone(&self.connection_semaphore).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!(
                    max = self.context.settings.limits.max_concurrent_requests,
                    "Connection limit reached, rejecting connection"
                );
                return;
            }
        };

        let context = Arc::clone(&self.context);
        context.metrics.connection_opened();
        debug!(active = context.metrics.active(), "New connection accepted");

        tokio::spawn(async move {
            let _permit = permit;

            match handle_connection(stream, Arc::clone(&context)).await {
                Ok(()) => {}
                Err(GuardError::Protocol {
                    kind: ProtocolErrorKind::ConnectionClosed,
                }) => {}
                Err(GuardError::Auth { kind }) => {
                    warn!(error = %kind, "Peer rejected");
                }
                Err(e) => error!(error = %e, "Connection handler error"),
            }

            context.metrics.connection_closed();
            debug!(active = context.metrics.active(), "Connection closed");
        });
    }

    /// Wait until every accepted connection has finished.
    pub async fn wait_for_drain(&self) {
        let poll_interval = Duration::from_millis(100);

        while self.context.metrics.active() > 0 {
            debug!(
                active = self.context.metrics.active(),
                "Waiting for connections to drain"
            );
            tokio::time::sleep(poll_interval).await;
        }

        info!("All connections drained");
    }
}

/// Remove a stale socket file and create the parent directory.
///
/// Refuses to remove a symlink at the socket path.
fn prepare_socket_path(socket_path: &Path) -> Result<(), GuardError> {
    if let Ok(metadata) = std::fs::symlink_metadata(socket_path) {
        if metadata.file_type().is_symlink() {
            return Err(GuardError::Socket {
                message: format!(
                    "Socket path {} is a symlink, refusing to remove it",
                    socket_path.display()
                ),
            });
        }

        std::fs::remove_file(socket_path).map_err(|e| GuardError::Socket {
            message: format!(
                "Failed to remove existing socket file {}: {}",
                socket_path.display(),
                e
            ),
        })?;
    }

    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| GuardError::Socket {
            message: format!(
                "Failed to create socket directory {}: {}",
                parent.display(),
                e
            ),
        })?;
    }

    Ok(())
}

fn set_socket_permissions(path: &Path, permissions: &str) -> Result<(), GuardError> {
    let mode = u32::from_str_radix(permissions, 8).map_err(|e| GuardError::Socket {
        message: format!("Invalid socket permissions '{}': {}", permissions, e),
    })?;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).map_err(|e| {
        GuardError::Socket {
            message: format!(
                "Failed to set socket permissions on {}: {}",
                path.display(),
                e
            ),
        }
    })
}

/// Hand the socket to the configured owner and group.
///
/// Only root can chown; otherwise the socket keeps the daemon's own
/// credentials. Failures are logged, not fatal.
fn apply_socket_ownership(path: &Path, owner: &str, group: &str) {
    use nix::unistd::{chown, Group, User};

    if !nix::unistd::geteuid().is_root() {
        debug!("Not running as root, leaving socket ownership unchanged");
        return;
    }

    let uid = match User::from_name(owner) {
        Ok(Some(user)) => user.uid,
        Ok(None) | Err(_) => {
            warn!(owner = %owner, "Socket owner not found, leaving ownership unchanged");
            return;
        }
    };
    let gid = match Group::from_name(group) {
        Ok(Some(group)) => group.gid,
        Ok(None) | Err(_) => {
            warn!(group = %group, "Socket group not found, leaving ownership unchanged");
            return;
        }
    };

    if let Err(e) = chown(path, Some(uid), Some(gid)) {
        warn!(error = %e, path = %path.display(), "Failed to set socket ownership");
    }
}

fn open_audit_logger(settings: &Settings) -> Option<Arc<AuditLogger>> {
    if !settings.audit.enabled {
        info!("Audit logging disabled");
        return None;
    }

    match AuditLogger::new(&settings.audit.log_path) {
        Ok(logger) => {
            info!(path = %settings.audit.log_path.display(), "Audit logging enabled");
            Some(Arc::new(logger))
        }
        Err(e) => {
            warn!(
                error = %e,
                path = %settings.audit.log_path.display(),
                "Failed to create audit logger, audit logging disabled"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_counters() {
        let metrics = ConnectionMetrics::new();
        metrics.record_request(true);
        metrics.record_request(false);
        metrics.connection_opened();
        metrics.connection_opened();
        metrics.connection_closed();

        assert_eq!(metrics.total_requests(), 2);
        assert_eq!(metrics.failed_requests(), 1);
        assert_eq!(metrics.active(), 1);
    }

    #[test]
    fn test_prepare_refuses_symlink() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("target");
        std::fs::write(&target, b"keep").unwrap();
        let link = dir.path().join("scanguard.sock");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        assert!(prepare_socket_path(&link).is_err());
        assert!(target.exists());
    }

    #[test]
    fn test_prepare_removes_stale_socket_and_creates_parent() {
        let dir = tempfile::TempDir::new().unwrap();
        let stale = dir.path().join("stale.sock");
        std::fs::write(&stale, b"").unwrap();
        prepare_socket_path(&stale).unwrap();
        assert!(!stale.exists());

        let nested = dir.path().join("run/scanguard/scanguard.sock");
        prepare_socket_path(&nested).unwrap();
        assert!(nested.parent().unwrap().is_dir());
    }
}
