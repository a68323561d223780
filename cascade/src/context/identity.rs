//! Run identity and trigger metadata.

use crate::utils::{generate_run_id, now_utc, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunIdentity {
    /// Unique run identifier.
    pub run_id: Uuid,
    /// Name of the plan being executed.
    pub plan_name: String,
    /// The tenant this run belongs to.
    pub tenant_id: String,
}

impl RunIdentity {
    /// Creates a new identity with a fresh run id.
    #[must_use]
    pub fn new(plan_name: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            run_id: generate_run_id(),
            plan_name: plan_name.into(),
            tenant_id: tenant_id.into(),
        }
    }
}

/// How a run came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// An operator triggered the run by hand.
    Manual,
    /// The scheduler triggered the run.
    Scheduled,
    /// An API client triggered the run.
    Api,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::Scheduled => write!(f, "scheduled"),
            Self::Api => write!(f, "api"),
        }
    }
}

/// Metadata about the trigger that created a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerInfo {
    /// The kind of trigger.
    pub kind: TriggerKind,
    /// Who or what triggered the run, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_by: Option<String>,
    /// When the trigger was received.
    pub requested_at: Timestamp,
}

impl TriggerInfo {
    /// Creates trigger metadata stamped with the current time.
    #[must_use]
    pub fn new(kind: TriggerKind) -> Self {
        Self {
            kind,
            triggered_by: None,
            requested_at: now_utc(),
        }
    }

    /// Creates a manual trigger.
    #[must_use]
    pub fn manual(triggered_by: impl Into<String>) -> Self {
        Self {
            kind: TriggerKind::Manual,
            triggered_by: Some(triggered_by.into()),
            requested_at: now_utc(),
        }
    }

    /// Creates a scheduled trigger.
    #[must_use]
    pub fn scheduled() -> Self {
        Self::new(TriggerKind::Scheduled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_has_fresh_id() {
        let a = RunIdentity::new("plan", "tenant-1");
        let b = RunIdentity::new("plan", "tenant-1");
        assert_ne!(a.run_id, b.run_id);
    }

    #[test]
    fn test_manual_trigger() {
        let t = TriggerInfo::manual("ops@example.com");
        assert_eq!(t.kind, TriggerKind::Manual);
        assert_eq!(t.triggered_by.as_deref(), Some("ops@example.com"));
    }

    #[test]
    fn test_trigger_kind_display() {
        assert_eq!(TriggerKind::Scheduled.to_string(), "scheduled");
    }
}
