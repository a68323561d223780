//! Cooperative cancellation.
//!
//! A run is cancelled by requesting it on the token threaded through the run
//! context. The executor polls the token at level boundaries only: steps
//! already in flight always finish on their own terms, and no new level
//! starts after the request is observed.

use crate::utils::{now_utc, Timestamp};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// A token for cooperative run cancellation.
///
/// Requests are idempotent: only the first reason and timestamp are kept.
#[derive(Default)]
pub struct CancellationToken {
    requested: AtomicBool,
    detail: RwLock<Option<RequestDetail>>,
}

#[derive(Clone)]
struct RequestDetail {
    reason: String,
    requested_at: Timestamp,
}

impl CancellationToken {
    /// Creates a new token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation with a reason.
    ///
    /// Idempotent: the first reason wins. Returns true if this call was the
    /// first request.
    pub fn request(&self, reason: impl Into<String>) -> bool {
        if self
            .requested
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            *self.detail.write() = Some(RequestDetail {
                reason: reason.into(),
                requested_at: now_utc(),
            });
            true
        } else {
            false
        }
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Returns the cancellation reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.detail.read().as_ref().map(|d| d.reason.clone())
    }

    /// Returns when cancellation was requested, if it was.
    #[must_use]
    pub fn requested_at(&self) -> Option<Timestamp> {
        self.detail.read().as_ref().map(|d| d.requested_at)
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("requested", &self.is_requested())
            .field("reason", &self.reason())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_not_requested() {
        let token = CancellationToken::new();
        assert!(!token.is_requested());
        assert!(token.reason().is_none());
        assert!(token.requested_at().is_none());
    }

    #[test]
    fn test_request() {
        let token = CancellationToken::new();
        assert!(token.request("operator asked"));

        assert!(token.is_requested());
        assert_eq!(token.reason(), Some("operator asked".to_string()));
        assert!(token.requested_at().is_some());
    }

    #[test]
    fn test_request_idempotent_first_reason_wins() {
        let token = CancellationToken::new();
        assert!(token.request("first"));
        assert!(!token.request("second"));

        assert_eq!(token.reason(), Some("first".to_string()));
    }
}
