//! # Request Records
//!
//! The canonical in-memory form of one executed request, produced by the format
//! adapters in [`crate::parser`] and consumed by the aggregation engine.
//!
//! Both adapters go through [`RecordBuilder`], so label, result code and response
//! message truncation is identical regardless of whether the source was a JTL XML
//! file or a CSV file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of characters kept for a request label.
pub const LABEL_LENGTH: usize = 70;

/// Maximum number of characters kept for a result code.
pub const RESULT_CODE_LENGTH: usize = 70;

/// Maximum number of characters kept for a response message.
pub const RESPONSE_MESSAGE_LENGTH: usize = 255;

/// Marker appended to truncated values.
pub const TRUNCATION_MARKER: &str = "..";

/// A failed or errored request-level assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionFailure {
    pub name: String,
    pub message: String,
}

/// One observed request outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub label: String,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub bytes_received: Option<u64>,
    pub success: bool,
    pub result_code: String,
    pub response_message: String,
    pub assertion_failures: Vec<AssertionFailure>,
}

impl Record {
    /// Bytes received, treating an absent value as zero.
    pub fn bytes(&self) -> u64 {
        self.bytes_received.unwrap_or(0)
    }

    /// Whether the request failed.
    pub fn is_failure(&self) -> bool {
        !self.success
    }
}

/// Builder shared by all format adapters.
///
/// Truncation happens in [`RecordBuilder::build`], never in the adapters themselves.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    label: String,
    timestamp: DateTime<Utc>,
    duration_ms: u64,
    bytes_received: Option<u64>,
    success: bool,
    result_code: String,
    response_message: String,
    assertion_failures: Vec<AssertionFailure>,
}

impl RecordBuilder {
    pub fn new(label: impl Into<String>, timestamp: DateTime<Utc>, duration_ms: u64) -> Self {
        Self {
            label: label.into(),
            timestamp,
            duration_ms,
            bytes_received: None,
            success: true,
            result_code: String::new(),
            response_message: String::new(),
            assertion_failures: Vec::new(),
        }
    }

    pub fn success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    pub fn bytes_received(mut self, bytes: Option<u64>) -> Self {
        self.bytes_received = bytes;
        self
    }

    pub fn result_code(mut self, code: impl Into<String>) -> Self {
        self.result_code = code.into();
        self
    }

    pub fn response_message(mut self, message: impl Into<String>) -> Self {
        self.response_message = message.into();
        self
    }

    pub fn assertion_failure(mut self, name: impl Into<String>, message: impl Into<String>) -> Self {
        self.push_assertion_failure(name, message);
        self
    }

    /// Attach an assertion failure to a builder held on a parse stack.
    pub fn push_assertion_failure(&mut self, name: impl Into<String>, message: impl Into<String>) {
        self.assertion_failures.push(AssertionFailure {
            name: name.into(),
            message: message.into(),
        });
    }

    pub fn build(self) -> Record {
        Record {
            label: truncate(&self.label, LABEL_LENGTH),
            timestamp: self.timestamp,
            duration_ms: self.duration_ms,
            bytes_received: self.bytes_received,
            success: self.success,
            result_code: truncate(&self.result_code, RESULT_CODE_LENGTH),
            response_message: truncate(&self.response_message, RESPONSE_MESSAGE_LENGTH),
            assertion_failures: self.assertion_failures,
        }
    }
}

/// Truncate `input` to at most `max_len` characters.
///
/// Values longer than `max_len` keep their first `max_len - 2` characters followed by
/// [`TRUNCATION_MARKER`].
pub fn truncate(input: &str, max_len: usize) -> String {
    if input.chars().count() <= max_len {
        return input.to_string();
    }
    let keep = max_len.saturating_sub(TRUNCATION_MARKER.len());
    let mut result: String = input.chars().take(keep).collect();
    result.push_str(TRUNCATION_MARKER);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_301_400_114_405).unwrap()
    }

    #[test]
    fn test_truncate_short_values_untouched() {
        assert_eq!(truncate("Login", LABEL_LENGTH), "Login");
        assert_eq!(truncate("", LABEL_LENGTH), "");
    }

    #[test]
    fn test_truncate_long_values() {
        let long = "x".repeat(100);
        let truncated = truncate(&long, LABEL_LENGTH);
        assert_eq!(truncated.chars().count(), LABEL_LENGTH);
        assert!(truncated.ends_with(".."));
        assert_eq!(&truncated[..68], &long[..68]);
    }

    #[test]
    fn test_truncate_is_char_based() {
        let long = "ä".repeat(80);
        let truncated = truncate(&long, LABEL_LENGTH);
        assert_eq!(truncated.chars().count(), LABEL_LENGTH);
    }

    #[test]
    fn test_builder_applies_truncation() {
        let record = RecordBuilder::new("l".repeat(90), ts(), 12)
            .success(false)
            .result_code("500")
            .response_message("m".repeat(300))
            .build();

        assert_eq!(record.label.chars().count(), LABEL_LENGTH);
        assert_eq!(record.response_message.chars().count(), RESPONSE_MESSAGE_LENGTH);
        assert_eq!(record.result_code, "500");
        assert!(record.is_failure());
    }

    #[test]
    fn test_builder_defaults() {
        let record = RecordBuilder::new("Home", ts(), 5).build();
        assert!(record.success);
        assert_eq!(record.bytes_received, None);
        assert_eq!(record.bytes(), 0);
        assert!(record.assertion_failures.is_empty());
    }
}
