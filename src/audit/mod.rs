//! Audit logging module.
//!
//! Every audited command becomes one JSON line with the caller's peer
//! credentials, scrubbed parameters, outcome and duration.

mod entry;
mod logger;
mod sanitize;

pub use entry::{AuditEntry, AuditOutcome};
pub use logger::AuditLogger;
pub use sanitize::sanitize_params;
