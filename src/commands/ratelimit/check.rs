//! Check and record one attempt.

use std::sync::Arc;

use tracing::debug;

use crate::error::GuardError;
use crate::ratelimit::{PolicyTable, RateLimiter};
use crate::validation::validate_caller_key;

use super::super::traits::Command;
use super::super::types::{CommandParams, CommandResult, ExecutionContext};
use super::resolve_limit;

/// Record an attempt for `key` if the limit allows it.
///
/// A refused attempt is still a successful command: the decision is the
/// result, with `allowed: false` and `retry_after_ms`.
pub struct CheckRateCommand {
    limiter: Arc<RateLimiter>,
    policies: Arc<PolicyTable>,
}

impl CheckRateCommand {
    pub fn new(limiter: Arc<RateLimiter>, policies: Arc<PolicyTable>) -> Self {
        Self { limiter, policies }
    }
}

impl Command for CheckRateCommand {
    fn name(&self) -> &'static str {
        "ratelimit.check"
    }

    fn validate(&self, params: &CommandParams) -> Result<(), GuardError> {
        validate_caller_key("key", params.get_str("key")?)?;
        resolve_limit(params, &self.policies)?;
        Ok(())
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        params: CommandParams,
    ) -> Result<CommandResult, GuardError> {
        let key = params.get_str("key")?;
        let (max, window_ms) = resolve_limit(&params, &self.policies)?;

        let decision = self.limiter.check_and_record(key, max, window_ms);
        debug!(
            request_id = %ctx.request_id,
            key = %key,
            allowed = decision.allowed,
            remaining = decision.remaining,
            "Rate limit checked"
        );

        Ok(CommandResult::success(serde_json::to_value(decision)?))
    }
}
