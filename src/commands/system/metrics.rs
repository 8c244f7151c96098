//! Daemon health statistics.

use std::sync::Arc;
use std::time::Instant;

use crate::error::GuardError;
use crate::ratelimit::RateLimiter;
use crate::socket::ConnectionMetrics;

use super::super::traits::Command;
use super::super::types::{CommandParams, CommandResult, ExecutionContext};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Reports uptime, request counters, active connections and the number of
/// keys the rate limiter is tracking.
pub struct MetricsCommand {
    start_time: Instant,
    metrics: Arc<ConnectionMetrics>,
    limiter: Arc<RateLimiter>,
}

impl MetricsCommand {
    pub fn new(metrics: Arc<ConnectionMetrics>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            start_time: Instant::now(),
            metrics,
            limiter,
        }
    }
}

impl Command for MetricsCommand {
    fn name(&self) -> &'static str {
        "system.metrics"
    }

    fn validate(&self, _params: &CommandParams) -> Result<(), GuardError> {
        Ok(())
    }

    fn execute(
        &self,
        _ctx: &ExecutionContext,
        _params: CommandParams,
    ) -> Result<CommandResult, GuardError> {
        Ok(CommandResult::success(serde_json::json!({
            "uptime_seconds": self.start_time.elapsed().as_secs(),
            "requests_total": self.metrics.total_requests(),
            "requests_failed": self.metrics.failed_requests(),
            "active_connections": self.metrics.active(),
            "tracked_rate_keys": self.limiter.tracked_keys(),
            "version": VERSION,
        })))
    }

    fn requires_audit(&self) -> bool {
        false
    }
}
