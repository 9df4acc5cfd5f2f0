//! Backend payload helpers.
//!
//! Backend errors arrive as JSON bodies of the form
//! `{"error": "...", "stack": "..."}`, on any status code. They are data,
//! so callers inspect every payload with [`ErrorPayload::from_response`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Error string the backend uses for "still computing, poll again".
pub const CONTINUE_WAIT: &str = "Continue wait";

/// Error string returned once the retry budget is spent.
pub const REQUEST_TIMEOUT: &str = "Request timeout";

/// An error-shaped backend payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Error message.
    pub error: String,
    /// Server-side stack trace, when the backend includes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorPayload {
    /// Extract the error from a payload, if it carries one.
    ///
    /// A non-string `error` value is rendered as JSON text.
    pub fn from_response(response: &Value) -> Option<Self> {
        let error = match response.get("error")? {
            Value::Null => return None,
            Value::String(message) => message.clone(),
            other => other.to_string(),
        };
        let stack = response
            .get("stack")
            .and_then(Value::as_str)
            .map(str::to_string);
        Some(Self { error, stack })
    }

    /// Returns true if this is the synthetic retry-exhaustion error.
    pub fn is_timeout(&self) -> bool {
        self.error == REQUEST_TIMEOUT
    }
}

impl std::fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.error)
    }
}

/// Returns true if `body` is the backend's "continue wait" sentinel.
pub fn is_continue_wait(body: &Value) -> bool {
    body.get("error").and_then(Value::as_str) == Some(CONTINUE_WAIT)
}

/// The payload returned when the retry budget is exhausted.
pub fn timeout_payload() -> Value {
    json!({ "error": REQUEST_TIMEOUT })
}
