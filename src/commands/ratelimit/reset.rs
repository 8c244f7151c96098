//! Clear a key's window.

use std::sync::Arc;

use tracing::info;

use crate::error::GuardError;
use crate::ratelimit::RateLimiter;
use crate::validation::validate_caller_key;

use super::super::traits::Command;
use super::super::types::{CommandParams, CommandResult, ExecutionContext};

/// Forget all attempts for `key`, e.g. after a successful login.
pub struct ResetRateCommand {
    limiter: Arc<RateLimiter>,
}

impl ResetRateCommand {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

impl Command for ResetRateCommand {
    fn name(&self) -> &'static str {
        "ratelimit.reset"
    }

    fn validate(&self, params: &CommandParams) -> Result<(), GuardError> {
        validate_caller_key("key", params.get_str("key")?)?;
        Ok(())
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        params: CommandParams,
    ) -> Result<CommandResult, GuardError> {
        let key = params.get_str("key")?;
        let existed = self.limiter.reset(key);

        info!(request_id = %ctx.request_id, key = %key, existed, "Rate limit reset");

        Ok(CommandResult::success(serde_json::json!({
            "reset": true,
            "existed": existed,
        })))
    }
}
