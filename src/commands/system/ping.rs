//! Health check.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::GuardError;

use super::super::traits::Command;
use super::super::types::{CommandParams, CommandResult, ExecutionContext};

/// Replies `pong` so the web application can tell the daemon is up.
pub struct PingCommand;

impl Command for PingCommand {
    fn name(&self) -> &'static str {
        "system.ping"
    }

    fn validate(&self, _params: &CommandParams) -> Result<(), GuardError> {
        Ok(())
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        _params: CommandParams,
    ) -> Result<CommandResult, GuardError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Ok(CommandResult::success(serde_json::json!({
            "pong": true,
            "timestamp": timestamp,
            "request_id": ctx.request_id.to_string(),
        })))
    }

    fn requires_audit(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::context;

    #[test]
    fn test_ping_execute() {
        let ctx = context("system.ping");
        let result = PingCommand
            .execute(&ctx, CommandParams::new(serde_json::json!({})))
            .unwrap();

        let data = result.data.unwrap();
        assert_eq!(data["pong"], true);
        assert!(data["timestamp"].is_u64());
        assert_eq!(data["request_id"], ctx.request_id.to_string());
    }

    #[test]
    fn test_ping_not_audited() {
        assert!(!PingCommand.requires_audit());
    }
}
