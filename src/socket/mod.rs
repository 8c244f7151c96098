//! Unix socket server module.
//!
//! Accepts connections, checks peer credentials, throttles each peer and
//! dispatches framed requests to the command registry.

mod connection;
mod listener;

pub use connection::{handle_connection, ConnectionContext};
pub use listener::{ConnectionMetrics, SocketListener};
