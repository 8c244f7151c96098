//! Command registry for dispatching requests to handlers.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{CommandErrorKind, GuardError};
use crate::ratelimit::{PolicyTable, RateLimiter};
use crate::socket::ConnectionMetrics;
use crate::token::TokenCodec;

use super::card::IssueCardCommand;
use super::ratelimit::{CheckRateCommand, RemainingRateCommand, ResetRateCommand};
use super::scan::ValidateScanCommand;
use super::system::{MetricsCommand, PingCommand};
use super::traits::Command;
use super::types::{CommandParams, CommandResult, ExecutionContext};

/// Registry of all available commands.
#[derive(Clone)]
pub struct CommandRegistry {
    commands: HashMap<&'static str, Arc<dyn Command>>,
}

impl CommandRegistry {
    /// Create a registry with every built-in command.
    ///
    /// `system.metrics` is only registered when connection metrics are given.
    pub fn new(
        codec: Arc<TokenCodec>,
        limiter: Arc<RateLimiter>,
        policies: Arc<PolicyTable>,
        metrics: Option<Arc<ConnectionMetrics>>,
    ) -> Self {
        let mut registry = Self {
            commands: HashMap::new(),
        };

        // System commands
        registry.register(Arc::new(PingCommand));
        if let Some(metrics) = metrics {
            registry.register(Arc::new(MetricsCommand::new(metrics, Arc::clone(&limiter))));
        }

        // Card and scan commands
        registry.register(Arc::new(IssueCardCommand::new(Arc::clone(&codec))));
        registry.register(Arc::new(ValidateScanCommand::new(
            codec,
            Arc::clone(&limiter),
            Arc::clone(&policies),
        )));

        // Rate limit commands
        registry.register(Arc::new(CheckRateCommand::new(
            Arc::clone(&limiter),
            Arc::clone(&policies),
        )));
        registry.register(Arc::new(RemainingRateCommand::new(
            Arc::clone(&limiter),
            policies,
        )));
        registry.register(Arc::new(ResetRateCommand::new(limiter)));

        info!(
            count = registry.commands.len(),
            "Command registry initialized"
        );

        registry
    }

    fn register(&mut self, command: Arc<dyn Command>) {
        let name = command.name();
        debug!(command = name, "Registering command");
        self.commands.insert(name, command);
    }

    /// Get a command by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.get(name).cloned()
    }

    /// Validate and run a command.
    pub fn dispatch(
        &self,
        ctx: &ExecutionContext,
        command_name: &str,
        params: CommandParams,
    ) -> Result<CommandResult, GuardError> {
        let command = self
            .commands
            .get(command_name)
            .ok_or_else(|| GuardError::Command {
                kind: CommandErrorKind::UnknownCommand {
                    name: command_name.to_string(),
                },
            })?;

        command.validate(&params)?;
        command.execute(ctx, params)
    }

    /// List all registered command names.
    pub fn list_commands(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.commands.keys().copied().collect();
        names.sort_unstable();
        names
    }
}
