//! Scan commands.

mod validate;

pub use validate::{ValidateScanCommand, SCAN_POLICY};
