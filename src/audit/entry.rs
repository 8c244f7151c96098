//! Audit entry types.

use serde::Serialize;
use uuid::Uuid;

use crate::auth::PeerInfo;

/// One line of the audit log.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    /// RFC 3339 timestamp of the request.
    pub timestamp: String,
    pub request_id: Uuid,
    pub command: String,
    /// Parameters after [`sanitize_params`](super::sanitize_params).
    pub params: serde_json::Value,
    pub peer_uid: u32,
    pub peer_gid: u32,
    pub peer_pid: i32,
    pub outcome: AuditOutcome,
    pub duration_ms: u64,
}

impl AuditEntry {
    /// Start an entry for a request from `peer`, stamped with the current time.
    pub fn new(
        request_id: Uuid,
        command: impl Into<String>,
        params: serde_json::Value,
        peer: &PeerInfo,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            request_id,
            command: command.into(),
            params,
            peer_uid: peer.uid,
            peer_gid: peer.gid,
            peer_pid: peer.pid,
            outcome,
            duration_ms: 0,
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

/// How the command ended.
///
/// Rate limit rejections and invalid scans are expected traffic, so they get
/// their own variants instead of being lumped in with failures.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    RateLimited { retry_after_ms: u64 },
    Rejected { error_code: String },
    Failure {
        error_code: String,
        error_message: String,
    },
}
