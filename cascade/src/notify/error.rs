//! Delivery error taxonomy.

use crate::classify::{classify_http_status, ErrorClass};
use thiserror::Error;

/// Errors a channel adapter can surface from a send.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The endpoint answered with a non-success status.
    #[error("HTTP {status} from notification endpoint")]
    Http {
        /// The response status code.
        status: u16,
    },

    /// The request never reached the endpoint.
    #[error("Connection error: {0}")]
    Connect(String),

    /// The request timed out.
    #[error("Notification request timed out")]
    Timeout,

    /// The channel configuration is unusable.
    #[error("Invalid channel config: {0}")]
    InvalidConfig(String),

    /// The request could not be built.
    #[error("Request build error: {0}")]
    Build(String),
}

impl NotifyError {
    /// Maps a transport error from the HTTP client.
    #[must_use]
    pub fn from_transport(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_builder() {
            Self::Build(e.to_string())
        } else {
            Self::Connect(e.to_string())
        }
    }

    /// Whether another attempt is worthwhile.
    ///
    /// Connection errors, timeouts, and 5xx-class statuses are retried;
    /// 4xx and configuration errors fail immediately.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connect(_) | Self::Timeout => true,
            Self::Http { status } => classify_http_status(*status) == ErrorClass::Transient,
            Self::InvalidConfig(_) | Self::Build(_) => false,
        }
    }
}
