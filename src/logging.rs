//! Structured logging utilities for the settlement core.
//!
//! Audit events are JSON objects emitted through the `log` facade; the
//! builder keeps every event carrying the same envelope fields.

use chrono::Utc;
use serde_json::{json, Value};

/// Get current timestamp in milliseconds
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Structured log event builder
///
/// Usage:
/// ```
/// use pixledger::logging::LogEvent;
///
/// let log_value = LogEvent::new("DEPOSIT_SETTLED")
///     .field("transaction_id", 1001)
///     .field("fee", "4.00")
///     .build();
///
/// log::info!("{}", log_value);
/// ```
pub struct LogEvent {
    fields: serde_json::Map<String, Value>,
}

impl LogEvent {
    /// Create a new log event with the given event name
    pub fn new(event: &str) -> Self {
        let mut fields = serde_json::Map::new();
        fields.insert("event".to_string(), json!(event));
        fields.insert("timestamp_ms".to_string(), json!(now_ms()));

        Self { fields }
    }

    /// Add a field to the log event
    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Build the final JSON value
    pub fn build(self) -> Value {
        Value::Object(self.fields)
    }
}

/// Mask a sensitive identifier (tax document, pix key) for log output.
/// Keeps the first 3 and last 2 characters.
pub fn mask_identifier(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 5 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}{}{}", head, "*".repeat(chars.len() - 5), tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event_builder() {
        let log = LogEvent::new("TEST_EVENT")
            .field("account_id", 1001)
            .field("amount", "100.00")
            .build();

        assert_eq!(log["event"], "TEST_EVENT");
        assert_eq!(log["account_id"], 1001);
        assert_eq!(log["amount"], "100.00");
        assert!(log.get("timestamp_ms").is_some());
    }

    #[test]
    fn test_mask_identifier() {
        assert_eq!(mask_identifier("12345678901"), "123******01");
        assert_eq!(mask_identifier("abc"), "***");
        assert_eq!(mask_identifier(""), "");
    }
}
