//! Validate a scanned QR payload.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{GuardError, ValidationErrorKind};
use crate::ratelimit::{PolicyTable, RateLimiter};
use crate::token::TokenCodec;
use crate::validation::validate_rate_key;

use super::super::traits::Command;
use super::super::types::{CommandParams, CommandResult, ExecutionContext};

/// Policy applied to scan attempts.
pub const SCAN_POLICY: &str = "scan";

/// Rate-limit the scanning client, then decode and authenticate the payload.
///
/// Parameters:
/// - `payload` (required): the raw text read from the QR code
/// - `client` (required): identifies the scanner (e.g. gate id or IP)
///
/// Fails with `RATE_LIMITED` (details carry `retry_after_ms`) or
/// `INVALID_SCAN`. Malformed payloads and wrong tokens look the same.
pub struct ValidateScanCommand {
    codec: Arc<TokenCodec>,
    limiter: Arc<RateLimiter>,
    policies: Arc<PolicyTable>,
}

impl ValidateScanCommand {
    pub fn new(
        codec: Arc<TokenCodec>,
        limiter: Arc<RateLimiter>,
        policies: Arc<PolicyTable>,
    ) -> Self {
        Self {
            codec,
            limiter,
            policies,
        }
    }
}

impl Command for ValidateScanCommand {
    fn name(&self) -> &'static str {
        "scan.validate"
    }

    fn validate(&self, params: &CommandParams) -> Result<(), GuardError> {
        params.require_string("payload")?;
        validate_rate_key("client", params.get_str("client")?)?;
        Ok(())
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        params: CommandParams,
    ) -> Result<CommandResult, GuardError> {
        let payload = params.get_str("payload")?;
        let client = params.get_str("client")?;

        let policy = self
            .policies
            .get(SCAN_POLICY)
            .ok_or_else(|| GuardError::Validation {
                kind: ValidationErrorKind::UnknownPolicy {
                    name: SCAN_POLICY.to_string(),
                },
            })?;

        let decision = self.limiter.check_policy(&format!("scan:{}", client), &policy);
        if !decision.allowed {
            warn!(
                request_id = %ctx.request_id,
                client = %client,
                retry_after_ms = decision.retry_after_ms,
                "Scan rate limit exceeded"
            );
            return Ok(CommandResult::failure_with_details(
                "RATE_LIMITED",
                format!("Scan attempts from {} exceed the limit", client),
                serde_json::json!({ "retry_after_ms": decision.retry_after_ms }),
            ));
        }

        match self.codec.validate_scan(payload) {
            Some(entity_id) => {
                debug!(request_id = %ctx.request_id, entity_id = %entity_id, "Scan accepted");
                Ok(CommandResult::success(serde_json::json!({
                    "valid": true,
                    "entity_id": entity_id,
                })))
            }
            None => {
                debug!(request_id = %ctx.request_id, client = %client, "Scan rejected");
                Ok(CommandResult::failure("INVALID_SCAN", "Invalid QR code"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{context, TEST_SECRET};
    use crate::ratelimit::{default_policies, RatePolicy};
    use std::collections::BTreeMap;

    const VALID_PAYLOAD: &str = "eyJpIjoic3R1ZGVudC00MiIsInQiOiJkODFiMTRiODUxZTE5MjEyIiwidiI6Mn0";

    fn command_with(policies: BTreeMap<String, RatePolicy>) -> ValidateScanCommand {
        ValidateScanCommand::new(
            Arc::new(TokenCodec::new(TEST_SECRET)),
            Arc::new(RateLimiter::new()),
            Arc::new(PolicyTable::new(policies)),
        )
    }

    fn params(payload: &str, client: &str) -> CommandParams {
        CommandParams::new(serde_json::json!({"payload": payload, "client": client}))
    }

    #[test]
    fn test_validate_params() {
        let cmd = command_with(default_policies());
        assert!(cmd.validate(&params("", "gate-1")).is_ok());
        assert!(cmd.validate(&params(VALID_PAYLOAD, "")).is_err());
        assert!(cmd
            .validate(&CommandParams::new(serde_json::json!({"client": "gate-1"})))
            .is_err());
    }

    #[test]
    fn test_valid_scan() {
        let cmd = command_with(default_policies());
        let result = cmd
            .execute(&context("scan.validate"), params(VALID_PAYLOAD, "gate-1"))
            .unwrap();

        assert!(result.success);
        let data = result.data.unwrap();
        assert_eq!(data["valid"], true);
        assert_eq!(data["entity_id"], "student-42");
    }

    #[test]
    fn test_invalid_scan() {
        let cmd = command_with(default_policies());
        for payload in ["", "not base64!", "eyJpZCI6IlgiLCJ0IjoiWSIsInYiOjF9"] {
            let result = cmd
                .execute(&context("scan.validate"), params(payload, "gate-1"))
                .unwrap();
            assert!(!result.success);
            assert_eq!(result.error_code.as_deref(), Some("INVALID_SCAN"));
        }
    }

    #[test]
    fn test_rate_limited_before_decoding() {
        let mut policies = default_policies();
        policies.insert(SCAN_POLICY.to_string(), RatePolicy::new(2, 60));
        let cmd = command_with(policies);
        let ctx = context("scan.validate");

        assert!(!cmd.execute(&ctx, params("garbage", "gate-1")).unwrap().success);
        assert!(cmd.execute(&ctx, params(VALID_PAYLOAD, "gate-1")).unwrap().success);

        let limited = cmd.execute(&ctx, params(VALID_PAYLOAD, "gate-1")).unwrap();
        assert_eq!(limited.error_code.as_deref(), Some("RATE_LIMITED"));
        let retry = limited.error_details.unwrap()["retry_after_ms"].as_u64().unwrap();
        assert!(retry > 0 && retry <= 60_000);

        // Other scanners are unaffected.
        assert!(cmd.execute(&ctx, params(VALID_PAYLOAD, "gate-2")).unwrap().success);
    }

    #[test]
    fn test_missing_scan_policy() {
        let cmd = command_with(BTreeMap::new());
        assert!(cmd
            .execute(&context("scan.validate"), params(VALID_PAYLOAD, "gate-1"))
            .is_err());
    }
}
