//! Error types for the scanguard daemon.
//!
//! Provides a unified error handling system using thiserror.

mod types;

pub use types::*;
