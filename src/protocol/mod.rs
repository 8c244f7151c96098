//! Wire protocol module.
//!
//! Request/response types and message framing for the Unix socket.
//!
//! ## Wire Format
//!
//! Messages are length-prefixed JSON:
//! ```text
//! [4 bytes: length (big-endian u32)][JSON payload]
//! ```

mod request;
mod response;
mod wire;

pub use request::Request;
pub use response::{ErrorResponse, Response};
pub use wire::{read_message, read_message_with_timeout, write_message, write_message_with_timeout};
