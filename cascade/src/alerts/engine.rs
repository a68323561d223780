//! The alert evaluation engine.

use super::conditions::evaluate_conditions;
use super::config::AlertConfig;
use super::history::{AlertHistory, AlertHistoryEntry, AlertOutcome};
use super::recipients::{resolve_recipients, OrgDirectory};
use super::source::{MetricSource, TenantRow};
use crate::errors::CascadeError;
use crate::notify::{DeliveryReport, NotificationPayload, ProviderRegistry};
use crate::utils::now_utc;
use chrono::Duration as ChronoDuration;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of evaluating one alert for one tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvaluation {
    /// The alert evaluated.
    pub alert_id: String,
    /// The tenant evaluated.
    pub tenant_id: String,
    /// Whether the conditions held.
    pub triggered: bool,
    /// What ultimately happened.
    pub outcome: AlertOutcome,
    /// Per-channel delivery reports, when delivery was attempted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reports: Vec<DeliveryReport>,
}

/// Evaluates declarative alerts against the analytical store and delivers
/// through the notification registry.
///
/// Constructed once at process start with its collaborators injected; there
/// is no hidden global state.
#[derive(Debug)]
pub struct AlertEngine {
    source: Arc<dyn MetricSource>,
    directory: Arc<dyn OrgDirectory>,
    history: Arc<dyn AlertHistory>,
    registry: Arc<ProviderRegistry>,
    configs: RwLock<Vec<AlertConfig>>,
}

impl AlertEngine {
    /// Creates an engine with its collaborators.
    #[must_use]
    pub fn new(
        source: Arc<dyn MetricSource>,
        directory: Arc<dyn OrgDirectory>,
        history: Arc<dyn AlertHistory>,
        registry: Arc<ProviderRegistry>,
    ) -> Self {
        Self {
            source,
            directory,
            history,
            registry,
            configs: RwLock::new(Vec::new()),
        }
    }

    /// Validates and installs the alert set, replacing the previous one.
    ///
    /// Every config must pass validation; a single malformed definition
    /// rejects the whole load so a bad deploy cannot half-apply.
    pub fn load_configs(&self, configs: Vec<AlertConfig>) -> Result<(), CascadeError> {
        for config in &configs {
            config.validate()?;
        }
        info!(alerts = configs.len(), "Alert configs loaded");
        *self.configs.write() = configs;
        Ok(())
    }

    /// Returns the installed configs.
    #[must_use]
    pub fn configs(&self) -> Vec<AlertConfig> {
        self.configs.read().clone()
    }

    /// Evaluates every enabled alert once.
    pub async fn evaluate_all(&self) -> Vec<AlertEvaluation> {
        let configs = self.configs();
        let mut evaluations = Vec::new();

        for config in configs.iter().filter(|c| c.enabled) {
            match self.evaluate(config, false).await {
                Ok(mut results) => evaluations.append(&mut results),
                Err(e) => {
                    // One broken alert never stops the rest of the sweep.
                    warn!(alert = %config.id, error = %e, "Alert evaluation failed");
                }
            }
        }

        evaluations
    }

    /// Evaluates one alert for every tenant its query returns.
    ///
    /// With `dry_run` set, delivery and history writes are skipped; the
    /// returned evaluations show what would have happened.
    pub async fn evaluate(
        &self,
        config: &AlertConfig,
        dry_run: bool,
    ) -> Result<Vec<AlertEvaluation>, CascadeError> {
        config.validate()?;

        let rows = self
            .source
            .query(&config.source.query, &config.source.params)
            .await?;

        let mut evaluations = Vec::with_capacity(rows.len());
        for row in rows {
            let evaluation = self.evaluate_tenant(config, &row, dry_run).await;
            evaluations.push(evaluation);
        }
        Ok(evaluations)
    }

    /// Validates and dry-runs (or fully runs) a single config without
    /// installing it.
    pub async fn test_alert(
        &self,
        config: &AlertConfig,
        dry_run: bool,
    ) -> Result<Vec<AlertEvaluation>, CascadeError> {
        self.evaluate(config, dry_run).await
    }

    async fn evaluate_tenant(
        &self,
        config: &AlertConfig,
        row: &TenantRow,
        dry_run: bool,
    ) -> AlertEvaluation {
        let tenant_id = row.tenant_id.as_str();
        let triggered = evaluate_conditions(&config.conditions, &row.fields);

        if !triggered {
            debug!(alert = %config.id, tenant = %tenant_id, "Alert not triggered");
            return AlertEvaluation {
                alert_id: config.id.clone(),
                tenant_id: tenant_id.to_string(),
                triggered: false,
                outcome: AlertOutcome::NotTriggered,
                reports: Vec::new(),
            };
        }

        if self.in_cooldown(config, tenant_id).await {
            info!(alert = %config.id, tenant = %tenant_id, "Alert suppressed by cooldown");
            if !dry_run {
                self.history
                    .record(
                        AlertHistoryEntry::new(&config.id, tenant_id, AlertOutcome::Suppressed)
                            .with_detail(format!(
                                "within {}s cooldown window",
                                config.cooldown.window_seconds
                            )),
                    )
                    .await;
            }
            return AlertEvaluation {
                alert_id: config.id.clone(),
                tenant_id: tenant_id.to_string(),
                triggered: true,
                outcome: AlertOutcome::Suppressed,
                reports: Vec::new(),
            };
        }

        if dry_run {
            return AlertEvaluation {
                alert_id: config.id.clone(),
                tenant_id: tenant_id.to_string(),
                triggered: true,
                outcome: AlertOutcome::Fired,
                reports: Vec::new(),
            };
        }

        let recipients = match resolve_recipients(&config.recipients, tenant_id, &*self.directory)
            .await
        {
            Ok(recipients) => recipients,
            Err(e) => {
                warn!(alert = %config.id, tenant = %tenant_id, error = %e, "Recipient resolution failed");
                self.history
                    .record(
                        AlertHistoryEntry::new(&config.id, tenant_id, AlertOutcome::DeliveryFailed)
                            .with_detail(format!("recipient resolution failed: {e}")),
                    )
                    .await;
                return AlertEvaluation {
                    alert_id: config.id.clone(),
                    tenant_id: tenant_id.to_string(),
                    triggered: true,
                    outcome: AlertOutcome::DeliveryFailed,
                    reports: Vec::new(),
                };
            }
        };

        let payload = build_payload(config, row);
        let reports = self
            .registry
            .dispatch(tenant_id, &config.notification.channels, &payload, &recipients)
            .await;

        let delivered = reports.iter().any(|r| r.success);
        let outcome = if delivered {
            AlertOutcome::Fired
        } else {
            AlertOutcome::DeliveryFailed
        };

        let detail = reports
            .iter()
            .filter_map(|r| r.error.as_ref().map(|e| format!("{}: {e}", r.channel)))
            .collect::<Vec<_>>()
            .join("; ");
        let mut entry = AlertHistoryEntry::new(&config.id, tenant_id, outcome);
        if !detail.is_empty() {
            entry = entry.with_detail(detail);
        }
        self.history.record(entry).await;

        info!(alert = %config.id, tenant = %tenant_id, outcome = %outcome, "Alert evaluated");
        AlertEvaluation {
            alert_id: config.id.clone(),
            tenant_id: tenant_id.to_string(),
            triggered: true,
            outcome,
            reports,
        }
    }

    async fn in_cooldown(&self, config: &AlertConfig, tenant_id: &str) -> bool {
        if !config.cooldown.enabled {
            return false;
        }
        let Some(last) = self.history.last_fired(&config.id, tenant_id).await else {
            return false;
        };
        let window = ChronoDuration::seconds(config.cooldown.window_seconds as i64);
        now_utc() - last < window
    }
}

/// Builds the channel-agnostic payload for a triggered alert.
fn build_payload(config: &AlertConfig, row: &TenantRow) -> NotificationPayload {
    let body = match &config.notification.template {
        Some(template) => render_template(template, row),
        None => {
            let summary = config
                .conditions
                .iter()
                .map(|c| {
                    let actual = row
                        .fields
                        .get(&c.field)
                        .map(ToString::to_string)
                        .unwrap_or_else(|| "<missing>".to_string());
                    match &c.unit {
                        Some(unit) => format!("{} = {actual} {unit} ({} {})", c.field, c.operator, c.value),
                        None => format!("{} = {actual} ({} {})", c.field, c.operator, c.value),
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "Alert '{}' triggered for tenant {}: {summary}",
                config.name, row.tenant_id
            )
        }
    };

    let mut payload = NotificationPayload::new(
        config.name.clone(),
        body,
        config.notification.severity,
    )
    .with_context("alert_id", serde_json::json!(config.id))
    .with_context("tenant_id", serde_json::json!(row.tenant_id));

    for condition in &config.conditions {
        if let Some(value) = row.fields.get(&condition.field) {
            payload = payload.with_context(condition.field.clone(), value.clone());
        }
    }
    payload
}

/// Replaces `{field}` placeholders with row values.
fn render_template(template: &str, row: &TenantRow) -> String {
    let mut rendered = template.to_string();
    for (key, value) in &row.fields {
        let placeholder = format!("{{{key}}}");
        if rendered.contains(&placeholder) {
            let printable = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            rendered = rendered.replace(&placeholder, &printable);
        }
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{
        AlertSource, Condition, ConditionOperator, Cooldown, InMemoryAlertHistory,
        NotificationSpec, RecipientSpec, Schedule, StaticMetricSource, StaticOrgDirectory,
    };
    use crate::notify::{ChannelKind, NotificationChannel, NotifyError, Severity};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Records delivered payloads; can be switched to fail.
    #[derive(Debug, Default)]
    struct CollectingChannel {
        delivered: Mutex<Vec<NotificationPayload>>,
        failing: AtomicBool,
    }

    #[async_trait]
    impl NotificationChannel for CollectingChannel {
        fn kind(&self) -> ChannelKind {
            ChannelKind::Webhook
        }

        async fn send(
            &self,
            payload: &NotificationPayload,
            _recipients: &[String],
        ) -> Result<(), NotifyError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(NotifyError::Http { status: 400 });
            }
            self.delivered.lock().push(payload.clone());
            Ok(())
        }
    }

    fn alert(cooldown: Cooldown) -> AlertConfig {
        AlertConfig {
            id: "cost-over-3".to_string(),
            name: "Cost over 3".to_string(),
            enabled: true,
            schedule: Schedule {
                cron: "0 * * * *".to_string(),
                timezone: "UTC".to_string(),
            },
            source: AlertSource {
                query: "select tenant_id, total_cost from costs".to_string(),
                params: HashMap::new(),
            },
            conditions: vec![Condition {
                field: "total_cost".to_string(),
                operator: ConditionOperator::Gt,
                value: serde_json::json!(3),
                unit: None,
            }],
            recipients: RecipientSpec::Custom {
                emails: vec!["ops@example.com".to_string()],
            },
            notification: NotificationSpec {
                channels: vec![ChannelKind::Webhook],
                severity: Severity::Warning,
                template: None,
            },
            cooldown,
        }
    }

    struct Fixture {
        engine: AlertEngine,
        history: Arc<InMemoryAlertHistory>,
        channel: Arc<CollectingChannel>,
    }

    fn fixture(total_cost: serde_json::Value, cooldown: Cooldown) -> (Fixture, AlertConfig) {
        let source = Arc::new(StaticMetricSource::new(vec![
            TenantRow::new("tenant-1").with_field("total_cost", total_cost),
        ]));
        let history = Arc::new(InMemoryAlertHistory::new());
        let registry = Arc::new(ProviderRegistry::new());
        let channel = Arc::new(CollectingChannel::default());
        registry.register_channel("tenant-1", channel.clone());

        let engine = AlertEngine::new(
            source,
            Arc::new(StaticOrgDirectory::new()),
            history.clone(),
            registry,
        );

        (
            Fixture {
                engine,
                history,
                channel,
            },
            alert(cooldown),
        )
    }

    #[tokio::test]
    async fn scenario_d_triggers_and_fires() {
        let (fx, config) = fixture(serde_json::json!(10.32), Cooldown::default());

        let evals = fx.engine.evaluate(&config, false).await.unwrap();
        assert_eq!(evals.len(), 1);
        assert!(evals[0].triggered);
        assert_eq!(evals[0].outcome, AlertOutcome::Fired);
        assert_eq!(fx.channel.delivered.lock().len(), 1);

        // Cooldown disabled: a second evaluation fires again.
        let evals = fx.engine.evaluate(&config, false).await.unwrap();
        assert_eq!(evals[0].outcome, AlertOutcome::Fired);
        assert_eq!(fx.channel.delivered.lock().len(), 2);
    }

    #[tokio::test]
    async fn scenario_d_cooldown_suppresses_second_delivery() {
        let cooldown = Cooldown {
            enabled: true,
            window_seconds: 24 * 3600,
        };
        let (fx, config) = fixture(serde_json::json!(10.32), cooldown);

        let evals = fx.engine.evaluate(&config, false).await.unwrap();
        assert_eq!(evals[0].outcome, AlertOutcome::Fired);

        let evals = fx.engine.evaluate(&config, false).await.unwrap();
        assert_eq!(evals[0].outcome, AlertOutcome::Suppressed);
        assert_eq!(fx.channel.delivered.lock().len(), 1, "no second delivery");

        let entries = fx.history.entries_for("cost-over-3");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].outcome, AlertOutcome::Suppressed);
    }

    #[tokio::test]
    async fn cooldown_expiry_re_delivers() {
        let cooldown = Cooldown {
            enabled: true,
            window_seconds: 3600,
        };
        let (fx, config) = fixture(serde_json::json!(10.32), cooldown);

        fx.engine.evaluate(&config, false).await.unwrap();

        // Age the cooldown record past the window.
        let expired = now_utc() - ChronoDuration::seconds(3601);
        fx.history.set_last_fired("cost-over-3", "tenant-1", expired);

        let evals = fx.engine.evaluate(&config, false).await.unwrap();
        assert_eq!(evals[0].outcome, AlertOutcome::Fired);
        assert_eq!(fx.channel.delivered.lock().len(), 2);
    }

    #[tokio::test]
    async fn condition_below_threshold_does_not_trigger() {
        let (fx, config) = fixture(serde_json::json!(2.5), Cooldown::default());

        let evals = fx.engine.evaluate(&config, false).await.unwrap();
        assert!(!evals[0].triggered);
        assert_eq!(evals[0].outcome, AlertOutcome::NotTriggered);
        assert!(fx.channel.delivered.lock().is_empty());
        assert!(fx.history.entries().is_empty());
    }

    #[tokio::test]
    async fn dry_run_skips_delivery_and_history() {
        let (fx, config) = fixture(serde_json::json!(10.32), Cooldown::default());

        let evals = fx.engine.test_alert(&config, true).await.unwrap();
        assert!(evals[0].triggered);
        assert!(fx.channel.delivered.lock().is_empty());
        assert!(fx.history.entries().is_empty());
    }

    #[tokio::test]
    async fn delivery_failure_recorded_without_cooldown_update() {
        let (fx, config) = fixture(serde_json::json!(10.32), Cooldown::default());
        fx.channel.failing.store(true, Ordering::SeqCst);

        let evals = fx.engine.evaluate(&config, false).await.unwrap();
        assert_eq!(evals[0].outcome, AlertOutcome::DeliveryFailed);

        // A failed delivery does not start a cooldown window.
        assert!(fx.history.last_fired("cost-over-3", "tenant-1").await.is_none());

        // Once delivery recovers, the alert fires.
        fx.channel.failing.store(false, Ordering::SeqCst);
        let evals = fx.engine.evaluate(&config, false).await.unwrap();
        assert_eq!(evals[0].outcome, AlertOutcome::Fired);
    }

    #[tokio::test]
    async fn one_tenant_failure_does_not_abort_others() {
        let source = Arc::new(StaticMetricSource::new(vec![
            TenantRow::new("tenant-broken").with_field("total_cost", serde_json::json!(50)),
            TenantRow::new("tenant-ok").with_field("total_cost", serde_json::json!(50)),
        ]));
        let history = Arc::new(InMemoryAlertHistory::new());
        let registry = Arc::new(ProviderRegistry::new());
        // Only tenant-ok has a channel; tenant-broken's delivery fails.
        let channel = Arc::new(CollectingChannel::default());
        registry.register_channel("tenant-ok", channel.clone());

        let engine = AlertEngine::new(
            source,
            Arc::new(StaticOrgDirectory::new()),
            history,
            registry,
        );

        let config = alert(Cooldown::default());
        let evals = engine.evaluate(&config, false).await.unwrap();

        assert_eq!(evals.len(), 2);
        let broken = evals.iter().find(|e| e.tenant_id == "tenant-broken").unwrap();
        let ok = evals.iter().find(|e| e.tenant_id == "tenant-ok").unwrap();
        assert_eq!(broken.outcome, AlertOutcome::DeliveryFailed);
        assert_eq!(ok.outcome, AlertOutcome::Fired);
    }

    #[tokio::test]
    async fn evaluate_all_skips_disabled() {
        let (fx, mut config) = fixture(serde_json::json!(10.32), Cooldown::default());
        config.enabled = false;
        fx.engine.load_configs(vec![config]).unwrap();

        let evals = fx.engine.evaluate_all().await;
        assert!(evals.is_empty());
        assert!(fx.channel.delivered.lock().is_empty());
    }

    #[tokio::test]
    async fn load_rejects_malformed_set() {
        let (fx, good) = fixture(serde_json::json!(1), Cooldown::default());
        let mut bad = good.clone();
        bad.conditions.clear();

        assert!(fx.engine.load_configs(vec![good, bad]).is_err());
        assert!(fx.engine.configs().is_empty(), "nothing half-applied");
    }

    #[test]
    fn template_rendering_fills_fields() {
        let row = TenantRow::new("t").with_field("total_cost", serde_json::json!(10.32));
        let rendered = render_template("Cost hit {total_cost} today", &row);
        assert_eq!(rendered, "Cost hit 10.32 today");
    }
}
