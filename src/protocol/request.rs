//! Request type for the scanguard protocol.

use serde::{Deserialize, Serialize};

/// A request from the web application.
///
/// Callers are authenticated by their socket peer credentials, so the
/// request itself carries no signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// The command to run (e.g. "scan.validate", "ratelimit.check").
    pub command: String,

    /// Command parameters as a JSON object.
    #[serde(default = "empty_params")]
    pub params: serde_json::Value,
}

fn empty_params() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl Request {
    /// Create a request with no parameters.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            params: empty_params(),
        }
    }

    /// Add a parameter (builder style).
    pub fn with_param(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        if let Some(obj) = self.params.as_object_mut() {
            obj.insert(key.to_string(), value.into());
        }
        self
    }
}
