//! The immutable state-transition record.

use crate::core::ErrorContext;
use crate::utils::{now_utc, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// The kind of entity a transition belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A pipeline run.
    Run,
    /// A step within a run.
    Step,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Run => write!(f, "run"),
            Self::Step => write!(f, "step"),
        }
    }
}

/// Identity key of a logical transition.
///
/// Re-delivering a record with the same key is a no-op at the store, so a
/// retried flush can never create a duplicate row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransitionKey {
    /// The entity the transition belongs to.
    pub entity_id: Uuid,
    /// State left.
    pub from_state: String,
    /// State entered.
    pub to_state: String,
    /// Emission sequence number within the run.
    pub sequence: u32,
}

/// An immutable record of a status change for a run or step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    /// Run or step.
    pub entity_kind: EntityKind,
    /// The entity's identity.
    pub entity_id: Uuid,
    /// State left.
    pub from_state: String,
    /// State entered.
    pub to_state: String,
    /// Emission sequence number within the run.
    pub sequence: u32,
    /// When the transition occurred.
    pub occurred_at: Timestamp,
    /// Why the transition happened, when there is a reason to record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Classified error type, for failure transitions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Error message, for failure transitions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Truncated stack trace, for failure transitions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    /// Retries performed before this transition.
    #[serde(default)]
    pub retry_count: u32,
    /// Milliseconds spent in the previous state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_in_state_ms: Option<u64>,
    /// Additional context.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl StateTransition {
    /// Creates a new transition record stamped with the current time.
    #[must_use]
    pub fn new(
        entity_kind: EntityKind,
        entity_id: Uuid,
        from_state: impl Into<String>,
        to_state: impl Into<String>,
        sequence: u32,
    ) -> Self {
        Self {
            entity_kind,
            entity_id,
            from_state: from_state.into(),
            to_state: to_state.into(),
            sequence,
            occurred_at: now_utc(),
            reason: None,
            error_type: None,
            error_message: None,
            stack_trace: None,
            retry_count: 0,
            duration_in_state_ms: None,
            metadata: HashMap::new(),
        }
    }

    /// Sets the reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a classified error context.
    #[must_use]
    pub fn with_error(mut self, err: &ErrorContext) -> Self {
        self.error_type = Some(err.class.to_string());
        self.error_message = Some(err.message.clone());
        self.stack_trace = err.stack_trace.clone();
        self.retry_count = err.retry_count;
        self
    }

    /// Sets the time spent in the previous state.
    #[must_use]
    pub fn with_duration_ms(mut self, ms: u64) -> Self {
        self.duration_in_state_ms = Some(ms);
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Returns the identity key of this logical transition.
    #[must_use]
    pub fn key(&self) -> TransitionKey {
        TransitionKey {
            entity_id: self.entity_id,
            from_state: self.from_state.clone(),
            to_state: self.to_state.clone(),
            sequence: self.sequence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_creation() {
        let id = Uuid::new_v4();
        let t = StateTransition::new(EntityKind::Run, id, "pending", "running", 0)
            .with_reason("triggered")
            .with_duration_ms(12);

        assert_eq!(t.entity_id, id);
        assert_eq!(t.from_state, "pending");
        assert_eq!(t.to_state, "running");
        assert_eq!(t.duration_in_state_ms, Some(12));
    }

    #[test]
    fn test_key_identity() {
        let id = Uuid::new_v4();
        let a = StateTransition::new(EntityKind::Step, id, "running", "failed", 3);
        let b = StateTransition::new(EntityKind::Step, id, "running", "failed", 3);

        // Same logical transition, same key, regardless of timestamps.
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_with_error_copies_context() {
        let err = crate::core::ErrorContext::new("rate limit hit")
            .with_trace("at step X")
            .with_retry_count(2);
        let t = StateTransition::new(EntityKind::Step, Uuid::new_v4(), "running", "failed", 1)
            .with_error(&err);

        assert_eq!(t.error_type.as_deref(), Some("transient"));
        assert_eq!(t.error_message.as_deref(), Some("rate limit hit"));
        assert_eq!(t.retry_count, 2);
    }

    #[test]
    fn test_serialization() {
        let t = StateTransition::new(EntityKind::Run, Uuid::new_v4(), "running", "completed", 5);
        let json = serde_json::to_string(&t).unwrap();
        let back: StateTransition = serde_json::from_str(&json).unwrap();
        assert_eq!(back.key(), t.key());
    }
}
