//! Query attempts left without recording one.

use std::sync::Arc;

use crate::error::GuardError;
use crate::ratelimit::{PolicyTable, RateLimiter};
use crate::validation::validate_caller_key;

use super::super::traits::Command;
use super::super::types::{CommandParams, CommandResult, ExecutionContext};
use super::resolve_limit;

/// Attempts `key` has left in the current window.
pub struct RemainingRateCommand {
    limiter: Arc<RateLimiter>,
    policies: Arc<PolicyTable>,
}

impl RemainingRateCommand {
    pub fn new(limiter: Arc<RateLimiter>, policies: Arc<PolicyTable>) -> Self {
        Self { limiter, policies }
    }
}

impl Command for RemainingRateCommand {
    fn name(&self) -> &'static str {
        "ratelimit.remaining"
    }

    fn validate(&self, params: &CommandParams) -> Result<(), GuardError> {
        validate_caller_key("key", params.get_str("key")?)?;
        resolve_limit(params, &self.policies)?;
        Ok(())
    }

    fn execute(
        &self,
        _ctx: &ExecutionContext,
        params: CommandParams,
    ) -> Result<CommandResult, GuardError> {
        let key = params.get_str("key")?;
        let (max, window_ms) = resolve_limit(&params, &self.policies)?;

        Ok(CommandResult::success(serde_json::json!({
            "remaining": self.limiter.remaining_attempts(key, max, window_ms),
        })))
    }

    fn requires_audit(&self) -> bool {
        // Read-only; polled by login forms.
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::context;
    use crate::ratelimit::default_policies;

    #[test]
    fn test_remaining_does_not_record() {
        let limiter = Arc::new(RateLimiter::new());
        let cmd = RemainingRateCommand::new(
            Arc::clone(&limiter),
            Arc::new(PolicyTable::new(default_policies())),
        );
        let ctx = context("ratelimit.remaining");
        let params =
            || CommandParams::new(serde_json::json!({"key": "upload:7", "max": 3, "window_ms": 60_000}));

        let data = cmd.execute(&ctx, params()).unwrap().data.unwrap();
        assert_eq!(data["remaining"], 3);

        limiter.check_and_record("upload:7", 3, 60_000);
        let data = cmd.execute(&ctx, params()).unwrap().data.unwrap();
        assert_eq!(data["remaining"], 2);

        let data = cmd.execute(&ctx, params()).unwrap().data.unwrap();
        assert_eq!(data["remaining"], 2);
        assert!(!cmd.requires_audit());
    }
}
