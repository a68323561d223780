//! Alert history and cooldown records.

use crate::utils::{now_utc, Timestamp};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fmt::Debug;

/// What happened when an alert was evaluated for a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertOutcome {
    /// Conditions held and delivery succeeded on at least one channel.
    Fired,
    /// Conditions held but the cooldown window suppressed delivery.
    Suppressed,
    /// Conditions held but every channel failed to deliver.
    DeliveryFailed,
    /// Conditions did not hold.
    NotTriggered,
}

impl fmt::Display for AlertOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fired => write!(f, "fired"),
            Self::Suppressed => write!(f, "suppressed"),
            Self::DeliveryFailed => write!(f, "delivery_failed"),
            Self::NotTriggered => write!(f, "not_triggered"),
        }
    }
}

/// One evaluation outcome, recorded after the fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertHistoryEntry {
    /// The alert evaluated.
    pub alert_id: String,
    /// The tenant evaluated.
    pub tenant_id: String,
    /// What happened.
    pub outcome: AlertOutcome,
    /// When it happened.
    pub at: Timestamp,
    /// Extra detail (delivery errors, suppression reason).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AlertHistoryEntry {
    /// Creates an entry stamped with the current time.
    #[must_use]
    pub fn new(
        alert_id: impl Into<String>,
        tenant_id: impl Into<String>,
        outcome: AlertOutcome,
    ) -> Self {
        Self {
            alert_id: alert_id.into(),
            tenant_id: tenant_id.into(),
            outcome,
            at: now_utc(),
            detail: None,
        }
    }

    /// Adds detail.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Trait for the alert history store.
///
/// The `(alert, tenant)` last-fired timestamp is the cooldown record: it is
/// read before firing and written when a `Fired` entry is recorded.
#[async_trait]
pub trait AlertHistory: Send + Sync + Debug {
    /// Returns when the alert last fired for the tenant, if ever.
    async fn last_fired(&self, alert_id: &str, tenant_id: &str) -> Option<Timestamp>;

    /// Records an evaluation outcome.
    async fn record(&self, entry: AlertHistoryEntry);
}

/// In-memory history store.
#[derive(Debug, Default)]
pub struct InMemoryAlertHistory {
    cooldowns: RwLock<HashMap<(String, String), Timestamp>>,
    entries: RwLock<Vec<AlertHistoryEntry>>,
}

impl InMemoryAlertHistory {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded entries.
    #[must_use]
    pub fn entries(&self) -> Vec<AlertHistoryEntry> {
        self.entries.read().clone()
    }

    /// Returns entries for one alert, in record order.
    #[must_use]
    pub fn entries_for(&self, alert_id: &str) -> Vec<AlertHistoryEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.alert_id == alert_id)
            .cloned()
            .collect()
    }

    /// Overwrites the cooldown record (for testing window expiry).
    pub fn set_last_fired(&self, alert_id: &str, tenant_id: &str, at: Timestamp) {
        self.cooldowns
            .write()
            .insert((alert_id.to_string(), tenant_id.to_string()), at);
    }
}

#[async_trait]
impl AlertHistory for InMemoryAlertHistory {
    async fn last_fired(&self, alert_id: &str, tenant_id: &str) -> Option<Timestamp> {
        self.cooldowns
            .read()
            .get(&(alert_id.to_string(), tenant_id.to_string()))
            .copied()
    }

    async fn record(&self, entry: AlertHistoryEntry) {
        if entry.outcome == AlertOutcome::Fired {
            self.cooldowns.write().insert(
                (entry.alert_id.clone(), entry.tenant_id.clone()),
                entry.at,
            );
        }
        self.entries.write().push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fired_updates_cooldown() {
        let history = InMemoryAlertHistory::new();
        assert!(history.last_fired("a", "t").await.is_none());

        history
            .record(AlertHistoryEntry::new("a", "t", AlertOutcome::Fired))
            .await;

        assert!(history.last_fired("a", "t").await.is_some());
        assert_eq!(history.entries().len(), 1);
    }

    #[tokio::test]
    async fn test_suppressed_does_not_update_cooldown() {
        let history = InMemoryAlertHistory::new();
        history
            .record(AlertHistoryEntry::new("a", "t", AlertOutcome::Suppressed))
            .await;
        history
            .record(AlertHistoryEntry::new("a", "t", AlertOutcome::DeliveryFailed))
            .await;

        assert!(history.last_fired("a", "t").await.is_none());
        assert_eq!(history.entries_for("a").len(), 2);
    }

    #[tokio::test]
    async fn test_cooldown_scoped_per_tenant() {
        let history = InMemoryAlertHistory::new();
        history
            .record(AlertHistoryEntry::new("a", "t1", AlertOutcome::Fired))
            .await;

        assert!(history.last_fired("a", "t1").await.is_some());
        assert!(history.last_fired("a", "t2").await.is_none());
    }
}
