//! Error classification and retry backoff.
//!
//! Every fault in the system is reduced to one of six classes; the class
//! alone decides whether a retry is allowed and how long to wait before it.

mod backoff;
mod rules;

pub use backoff::{retry_delay, RetryPolicy};
pub use rules::{classify, classify_http_status, is_retryable, ErrorClass};
