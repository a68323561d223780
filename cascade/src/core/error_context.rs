//! Normalized error context attached to failed steps and runs.

use crate::classify::{classify, ErrorClass};
use serde::{Deserialize, Serialize};

/// Maximum number of characters kept from a stack trace.
pub const MAX_TRACE_CHARS: usize = 2000;

/// The normalized shape every step or run failure is reduced to.
///
/// Raised faults and returned failure outcomes both end up here, so the rest
/// of the system never needs to know which channel the failure arrived on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Classified error type.
    pub class: ErrorClass,
    /// Human-readable error message.
    pub message: String,
    /// Truncated stack trace, when one was captured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    /// Number of retries performed before this failure became final.
    #[serde(default)]
    pub retry_count: u32,
}

impl ErrorContext {
    /// Creates an error context, classifying the message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            class: classify(&message),
            message,
            stack_trace: None,
            retry_count: 0,
        }
    }

    /// Creates an error context with an explicit classification.
    #[must_use]
    pub fn with_class(message: impl Into<String>, class: ErrorClass) -> Self {
        Self {
            class,
            message: message.into(),
            stack_trace: None,
            retry_count: 0,
        }
    }

    /// Attaches a stack trace, truncating it to [`MAX_TRACE_CHARS`].
    #[must_use]
    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        let trace = trace.into();
        self.stack_trace = Some(truncate_trace(&trace));
        self
    }

    /// Sets the retry count.
    #[must_use]
    pub fn with_retry_count(mut self, count: u32) -> Self {
        self.retry_count = count;
        self
    }
}

/// Truncates a trace to [`MAX_TRACE_CHARS`] characters.
#[must_use]
pub fn truncate_trace(trace: &str) -> String {
    if trace.chars().count() <= MAX_TRACE_CHARS {
        trace.to_string()
    } else {
        trace.chars().take(MAX_TRACE_CHARS).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_classifies_message() {
        let ctx = ErrorContext::new("connection refused by host");
        assert_eq!(ctx.class, ErrorClass::Transient);
    }

    #[test]
    fn test_with_class_overrides() {
        let ctx = ErrorContext::with_class("anything", ErrorClass::Validation);
        assert_eq!(ctx.class, ErrorClass::Validation);
    }

    #[test]
    fn test_trace_truncation() {
        let long = "x".repeat(MAX_TRACE_CHARS + 500);
        let ctx = ErrorContext::new("boom").with_trace(long);
        assert_eq!(ctx.stack_trace.unwrap().chars().count(), MAX_TRACE_CHARS);
    }

    #[test]
    fn test_short_trace_kept_whole() {
        let ctx = ErrorContext::new("boom").with_trace("short trace");
        assert_eq!(ctx.stack_trace.as_deref(), Some("short trace"));
    }
}
