//! Command trait definition.

use crate::error::GuardError;

use super::types::{CommandParams, CommandResult, ExecutionContext};

/// A request handler addressable by name over the socket.
///
/// # Example
///
/// ```ignore
/// pub struct EchoCommand;
///
/// impl Command for EchoCommand {
///     fn name(&self) -> &'static str {
///         "system.echo"
///     }
///
///     fn validate(&self, params: &CommandParams) -> Result<(), GuardError> {
///         params.require_string("text")
///     }
///
///     fn execute(
///         &self,
///         _ctx: &ExecutionContext,
///         params: CommandParams,
///     ) -> Result<CommandResult, GuardError> {
///         Ok(CommandResult::success(serde_json::json!({"text": params.get_str("text")?})))
///     }
/// }
/// ```
pub trait Command: Send + Sync {
    /// Name used in requests (e.g. "scan.validate").
    fn name(&self) -> &'static str;

    /// Check parameters before `execute()` runs.
    fn validate(&self, params: &CommandParams) -> Result<(), GuardError>;

    /// Run the command. Called from `spawn_blocking`.
    fn execute(
        &self,
        ctx: &ExecutionContext,
        params: CommandParams,
    ) -> Result<CommandResult, GuardError>;

    /// Whether executions are written to the audit log.
    fn requires_audit(&self) -> bool {
        true
    }
}
