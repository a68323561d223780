//! Pattern rules mapping error messages to a taxonomy value.

use regex::RegexSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// The error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Retry-eligible: rate limits, connection resets, 5xx, deadlocks.
    Transient,
    /// Not worth retrying: auth, permission, not-found.
    Permanent,
    /// A timeout was exceeded.
    Timeout,
    /// Input or configuration failed validation.
    #[serde(rename = "validation_error")]
    Validation,
    /// An upstream dependency this step needs is unavailable or failed.
    DependencyFailure,
    /// Nothing matched; treated as non-retryable to avoid retry loops.
    Unknown,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Permanent => write!(f, "permanent"),
            Self::Timeout => write!(f, "timeout"),
            Self::Validation => write!(f, "validation_error"),
            Self::DependencyFailure => write!(f, "dependency_failure"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

fn transient_patterns() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| {
        RegexSet::new([
            r"(?i)rate.?limit",
            r"(?i)too many requests",
            r"(?i)connection (refused|reset|aborted|closed)",
            r"(?i)broken pipe",
            r"(?i)temporarily unavailable",
            r"(?i)service unavailable",
            r"(?i)\b50[0234]\b",
            r"(?i)internal server error",
            r"(?i)bad gateway",
            r"(?i)deadlock",
            r"(?i)throttl",
        ])
        .unwrap_or_else(|_| RegexSet::empty())
    })
}

fn timeout_patterns() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| {
        RegexSet::new([
            r"(?i)timed?.?out",
            r"(?i)deadline exceeded",
        ])
        .unwrap_or_else(|_| RegexSet::empty())
    })
}

fn permanent_patterns() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| {
        RegexSet::new([
            r"(?i)unauthoriz",
            r"(?i)forbidden",
            r"(?i)permission denied",
            r"(?i)access denied",
            r"(?i)not found",
            r"(?i)does not exist",
            r"(?i)authentication failed",
            r"(?i)invalid (credentials|token|api.?key)",
        ])
        .unwrap_or_else(|_| RegexSet::empty())
    })
}

fn validation_patterns() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| {
        RegexSet::new([
            r"(?i)validation",
            r"(?i)invalid (value|field|format|input|argument|parameter)",
            r"(?i)schema mismatch",
            r"(?i)missing required",
            r"(?i)malformed",
        ])
        .unwrap_or_else(|_| RegexSet::empty())
    })
}

fn dependency_patterns() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| {
        RegexSet::new([
            r"(?i)upstream (step|stage|task) failed",
            r"(?i)dependency fail",
            r"(?i)required output missing",
        ])
        .unwrap_or_else(|_| RegexSet::empty())
    })
}

/// Classifies an error message into an [`ErrorClass`].
///
/// Timeout signatures win over transient ones so that "connection timed out"
/// is reported as a timeout, not a retryable blip.
#[must_use]
pub fn classify(message: &str) -> ErrorClass {
    if timeout_patterns().is_match(message) {
        ErrorClass::Timeout
    } else if validation_patterns().is_match(message) {
        ErrorClass::Validation
    } else if dependency_patterns().is_match(message) {
        ErrorClass::DependencyFailure
    } else if permanent_patterns().is_match(message) {
        ErrorClass::Permanent
    } else if transient_patterns().is_match(message) {
        ErrorClass::Transient
    } else {
        ErrorClass::Unknown
    }
}

/// Classifies an HTTP status code for delivery retry decisions.
#[must_use]
pub fn classify_http_status(status: u16) -> ErrorClass {
    match status {
        429 => ErrorClass::Transient,
        408 => ErrorClass::Timeout,
        400 | 422 => ErrorClass::Validation,
        401..=499 => ErrorClass::Permanent,
        500..=599 => ErrorClass::Transient,
        _ => ErrorClass::Unknown,
    }
}

/// Returns true only for [`ErrorClass::Transient`].
///
/// `Unknown` is deliberately non-retryable.
#[must_use]
pub fn is_retryable(class: ErrorClass) -> bool {
    matches!(class, ErrorClass::Transient)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_signatures() {
        assert_eq!(classify("Rate limit exceeded"), ErrorClass::Transient);
        assert_eq!(classify("connection reset by peer"), ErrorClass::Transient);
        assert_eq!(classify("HTTP 503 service unavailable"), ErrorClass::Transient);
        assert_eq!(classify("deadlock detected"), ErrorClass::Transient);
        assert_eq!(classify("request was throttled"), ErrorClass::Transient);
    }

    #[test]
    fn test_permanent_signatures() {
        assert_eq!(classify("401 Unauthorized"), ErrorClass::Permanent);
        assert_eq!(classify("permission denied"), ErrorClass::Permanent);
        assert_eq!(classify("table does not exist"), ErrorClass::Permanent);
    }

    #[test]
    fn test_timeout_signatures() {
        assert_eq!(classify("operation timed out"), ErrorClass::Timeout);
        assert_eq!(classify("deadline exceeded"), ErrorClass::Timeout);
        // Timeout wins over transient wording.
        assert_eq!(classify("connection timed out"), ErrorClass::Timeout);
    }

    #[test]
    fn test_validation_signatures() {
        assert_eq!(classify("validation failed for field x"), ErrorClass::Validation);
        assert_eq!(classify("missing required column"), ErrorClass::Validation);
        assert_eq!(classify("malformed JSON payload"), ErrorClass::Validation);
    }

    #[test]
    fn test_dependency_signatures() {
        assert_eq!(classify("upstream step failed: extract"), ErrorClass::DependencyFailure);
        assert_eq!(classify("required output missing: rows"), ErrorClass::DependencyFailure);
    }

    #[test]
    fn test_unknown_fallback() {
        assert_eq!(classify("something odd happened"), ErrorClass::Unknown);
    }

    #[test]
    fn test_retryable_only_transient() {
        assert!(is_retryable(ErrorClass::Transient));
        assert!(!is_retryable(ErrorClass::Permanent));
        assert!(!is_retryable(ErrorClass::Timeout));
        assert!(!is_retryable(ErrorClass::Validation));
        assert!(!is_retryable(ErrorClass::DependencyFailure));
        assert!(!is_retryable(ErrorClass::Unknown));
    }

    #[test]
    fn test_http_status_classification() {
        assert_eq!(classify_http_status(500), ErrorClass::Transient);
        assert_eq!(classify_http_status(503), ErrorClass::Transient);
        assert_eq!(classify_http_status(429), ErrorClass::Transient);
        assert_eq!(classify_http_status(408), ErrorClass::Timeout);
        assert_eq!(classify_http_status(401), ErrorClass::Permanent);
        assert_eq!(classify_http_status(404), ErrorClass::Permanent);
        assert_eq!(classify_http_status(400), ErrorClass::Validation);
        assert_eq!(classify_http_status(422), ErrorClass::Validation);
    }

    #[test]
    fn test_class_serialization() {
        let json = serde_json::to_string(&ErrorClass::DependencyFailure).unwrap();
        assert_eq!(json, r#""dependency_failure""#);
    }
}
