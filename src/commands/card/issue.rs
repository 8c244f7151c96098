//! Issue a card token for an entity.

use std::sync::Arc;

use tracing::info;

use crate::error::GuardError;
use crate::token::{TokenCodec, CURRENT_VERSION};
use crate::validation::validate_entity_id;

use super::super::traits::Command;
use super::super::types::{CommandParams, CommandResult, ExecutionContext};

/// Derive the token for an entity and return the payload to print on its card.
///
/// Parameters:
/// - `entity_id` (required): the identifier encoded on the card
pub struct IssueCardCommand {
    codec: Arc<TokenCodec>,
}

impl IssueCardCommand {
    pub fn new(codec: Arc<TokenCodec>) -> Self {
        Self { codec }
    }
}

impl Command for IssueCardCommand {
    fn name(&self) -> &'static str {
        "card.issue"
    }

    fn validate(&self, params: &CommandParams) -> Result<(), GuardError> {
        validate_entity_id(params.get_str("entity_id")?)?;
        Ok(())
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        params: CommandParams,
    ) -> Result<CommandResult, GuardError> {
        let entity_id = params.get_str("entity_id")?;
        let card = self.codec.issue(entity_id);

        info!(
            request_id = %ctx.request_id,
            entity_id = %card.entity_id,
            "Card token issued"
        );

        Ok(CommandResult::success(serde_json::json!({
            "entity_id": card.entity_id,
            "token": card.token,
            "payload": card.payload,
            "version": CURRENT_VERSION,
        })))
    }
}
