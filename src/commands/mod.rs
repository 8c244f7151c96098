//! Command handlers module.
//!
//! Contains the command registry and all command implementations.
//!
//! ## Adding a New Command
//!
//! 1. Create a new file in the appropriate subdirectory (e.g. `card/`, `ratelimit/`)
//! 2. Implement the `Command` trait
//! 3. Register the command in `CommandRegistry::new()`

mod registry;
mod traits;
mod types;

pub mod card;
pub mod ratelimit;
pub mod scan;
pub mod system;

pub use registry::CommandRegistry;
pub use traits::Command;
pub use types::{CommandParams, CommandResult, ExecutionContext};

#[cfg(test)]
pub(crate) mod test_support {
    use uuid::Uuid;

    use crate::auth::PeerInfo;

    use super::ExecutionContext;

    pub const TEST_SECRET: &[u8] = b"test-secret";

    pub fn context(command: &str) -> ExecutionContext {
        ExecutionContext::new(
            Uuid::new_v4(),
            PeerInfo {
                uid: 33,
                gid: 33,
                pid: 12345,
            },
            1_700_000_000,
            command.to_string(),
        )
    }
}
