//! Per-connection handler.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixStream;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audit::{sanitize_params, AuditEntry, AuditLogger, AuditOutcome};
use crate::auth::{verify_peer, PeerInfo};
use crate::commands::{CommandParams, CommandRegistry, CommandResult, ExecutionContext};
use crate::config::Settings;
use crate::error::{GuardError, ProtocolErrorKind};
use crate::protocol::{read_message_with_timeout, write_message_with_timeout, Request, Response};
use crate::ratelimit::RateLimiter;

use super::listener::ConnectionMetrics;

/// Everything a connection needs, shared by all connections.
pub struct ConnectionContext {
    pub settings: Arc<Settings>,
    pub registry: Arc<CommandRegistry>,
    /// Per-peer request throttle. Not shared with any command.
    pub peer_limiter: Arc<RateLimiter>,
    pub metrics: Arc<ConnectionMetrics>,
    pub audit_logger: Option<Arc<AuditLogger>>,
}

/// Authenticate the peer, then serve requests until it disconnects.
pub async fn handle_connection(
    stream: UnixStream,
    context: Arc<ConnectionContext>,
) -> Result<(), GuardError> {
    let peer = verify_peer(&stream, &context.settings.security.allowed_peer_uids)?;
    debug!(uid = peer.uid, gid = peer.gid, pid = peer.pid, "Peer authenticated");

    let (mut reader, mut writer) = stream.into_split();

    loop {
        match process_request(&mut reader, &mut writer, &context, &peer).await {
            Ok(()) => continue,
            Err(GuardError::Protocol {
                kind: ProtocolErrorKind::ConnectionClosed,
            }) => {
                debug!(uid = peer.uid, "Client disconnected");
                return Ok(());
            }
            Err(GuardError::Protocol {
                kind: ProtocolErrorKind::ConnectionTimeout,
            }) => {
                warn!(uid = peer.uid, "Connection timed out");
                return Ok(());
            }
            Err(e) => return Err(e),
        }
    }
}

/// Read one request, answer it, and audit it.
async fn process_request<R, W>(
    reader: &mut R,
    writer: &mut W,
    context: &ConnectionContext,
    peer: &PeerInfo,
) -> Result<(), GuardError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let limits = &context.settings.limits;
    let socket_timeout = Duration::from_secs(limits.socket_timeout_seconds);
    let msg = read_message_with_timeout(reader, limits.max_message_size, socket_timeout).await?;

    let request_id = Uuid::new_v4();
    let start_time = Instant::now();

    let response = match serde_json::from_slice::<Request>(&msg) {
        Ok(request) => {
            info!(
                request_id = %request_id,
                command = %request.command,
                uid = peer.uid,
                "Received request"
            );
            respond(context, peer, request_id, request, start_time).await
        }
        Err(e) => {
            warn!(request_id = %request_id, error = %e, "Malformed request");
            Response::error_with_id(request_id, "VALIDATION_ERROR", format!("Invalid JSON: {}", e))
        }
    };

    context.metrics.record_request(response.success);

    let response_bytes = serde_json::to_vec(&response)?;
    write_message_with_timeout(writer, &response_bytes, socket_timeout).await?;

    Ok(())
}

async fn respond(
    context: &ConnectionContext,
    peer: &PeerInfo,
    request_id: Uuid,
    request: Request,
    start_time: Instant,
) -> Response {
    let decision = context
        .peer_limiter
        .check_policy(&peer.rate_key(), &context.settings.security.peer_rate_limit);
    if !decision.allowed {
        warn!(
            request_id = %request_id,
            uid = peer.uid,
            retry_after_ms = decision.retry_after_ms,
            "Peer rate limit exceeded"
        );
        return Response::error_with_details(
            request_id,
            "RATE_LIMITED",
            format!("Peer {} exceeded its request limit", peer.uid),
            serde_json::json!({ "retry_after_ms": decision.retry_after_ms }),
        );
    }

    // Unknown commands are audited too.
    let requires_audit = context
        .registry
        .get(&request.command)
        .map(|cmd| cmd.requires_audit())
        .unwrap_or(true);

    let audit_params = match (&context.audit_logger, requires_audit) {
        (Some(_), true) => Some(sanitize_params(&request.params)),
        _ => None,
    };

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let ctx = ExecutionContext::new(request_id, peer.clone(), timestamp, request.command.clone());
    let params = CommandParams::new(request.params);
    let registry = Arc::clone(&context.registry);
    let command_name = request.command.clone();

    let dispatched =
        tokio::task::spawn_blocking(move || registry.dispatch(&ctx, &command_name, params)).await;

    let (response, outcome) = match dispatched {
        Ok(Ok(result)) => {
            info!(
                request_id = %request_id,
                command = %request.command,
                success = result.success,
                "Command executed"
            );
            let outcome = result_outcome(&result);
            (result_response(request_id, result), outcome)
        }
        Ok(Err(e)) => {
            warn!(
                request_id = %request_id,
                command = %request.command,
                error = %e,
                "Command rejected"
            );
            let outcome = AuditOutcome::Failure {
                error_code: e.code().to_string(),
                error_message: e.to_string(),
            };
            (Response::error_with_id(request_id, e.code(), e.to_string()), outcome)
        }
        Err(e) => {
            error!(
                request_id = %request_id,
                command = %request.command,
                error = %e,
                "Command task panicked"
            );
            let outcome = AuditOutcome::Failure {
                error_code: "INTERNAL_ERROR".to_string(),
                error_message: "Command execution failed".to_string(),
            };
            (
                Response::error_with_id(request_id, "INTERNAL_ERROR", "Command execution failed"),
                outcome,
            )
        }
    };

    if let (Some(logger), Some(params)) = (&context.audit_logger, audit_params) {
        let duration_ms = u64::try_from(start_time.elapsed().as_millis()).unwrap_or(u64::MAX);
        let entry = AuditEntry::new(request_id, request.command, params, peer, outcome)
            .with_duration_ms(duration_ms);
        if let Err(e) = logger.log(&entry) {
            error!(error = %e, "Failed to write audit log entry");
        }
    }

    response
}

fn result_response(request_id: Uuid, result: CommandResult) -> Response {
    if result.success {
        return Response::success_with_id(
            request_id,
            result.data.unwrap_or_else(|| serde_json::json!({})),
        );
    }

    let code = result
        .error_code
        .unwrap_or_else(|| "COMMAND_ERROR".to_string());
    let message = result
        .error_message
        .unwrap_or_else(|| "Unknown error".to_string());

    match result.error_details {
        Some(details) => Response::error_with_details(request_id, code, message, details),
        None => Response::error_with_id(request_id, code, message),
    }
}

fn result_outcome(result: &CommandResult) -> AuditOutcome {
    if result.success {
        return AuditOutcome::Success;
    }

    let code = result.error_code.as_deref().unwrap_or("COMMAND_ERROR");
    match code {
        "RATE_LIMITED" => AuditOutcome::RateLimited {
            retry_after_ms: result
                .error_details
                .as_ref()
                .and_then(|d| d.get("retry_after_ms"))
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
        },
        "INVALID_SCAN" => AuditOutcome::Rejected {
            error_code: code.to_string(),
        },
        _ => AuditOutcome::Failure {
            error_code: code.to_string(),
            error_message: result.error_message.clone().unwrap_or_default(),
        },
    }
}
