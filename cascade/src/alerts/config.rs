//! Declarative alert configuration, validated into typed form at load time.

use crate::errors::CascadeError;
use crate::notify::{ChannelKind, Severity};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// When an alert is evaluated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    /// Cron expression, carried as declarative metadata.
    pub cron: String,
    /// IANA timezone name.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// The query an alert runs against the analytical store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertSource {
    /// Parameterized query template.
    pub query: String,
    /// Template parameters.
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
}

/// Comparison operator for a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    /// Field strictly greater than value.
    Gt,
    /// Field greater than or equal to value.
    Gte,
    /// Field strictly less than value.
    Lt,
    /// Field less than or equal to value.
    Lte,
    /// Field equals value.
    Eq,
    /// Field differs from value.
    Ne,
    /// Field within `[min, max]` inclusive; value is a two-element array.
    Between,
    /// Field (string or array) contains value.
    Contains,
    /// Field is one of the values in the array.
    In,
    /// Field exceeds a percentage of another field; value is
    /// `{"base_field": ..., "percentage": ...}`.
    PercentageOfExceeds,
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Between => "between",
            Self::Contains => "contains",
            Self::In => "in",
            Self::PercentageOfExceeds => "percentage_of_exceeds",
        };
        write!(f, "{s}")
    }
}

/// One threshold condition. All of an alert's conditions must hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    /// The row field the condition reads.
    pub field: String,
    /// The comparison operator.
    pub operator: ConditionOperator,
    /// The comparison value; shape depends on the operator.
    pub value: serde_json::Value,
    /// Display unit, carried through to notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Who receives the alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecipientSpec {
    /// Look up the organization owners of the tenant.
    OrgOwners,
    /// A fixed list embedded in the config.
    Custom {
        /// Recipient email addresses.
        emails: Vec<String>,
    },
}

/// How the alert is delivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSpec {
    /// Channels to deliver on.
    pub channels: Vec<ChannelKind>,
    /// Severity attached to the payload.
    pub severity: Severity,
    /// Optional body template; `{field}` placeholders are filled from the
    /// evaluated row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

/// Suppression window between repeated deliveries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Cooldown {
    /// Whether cooldown applies.
    pub enabled: bool,
    /// Window length in seconds.
    #[serde(default)]
    pub window_seconds: u64,
}

impl Default for Cooldown {
    fn default() -> Self {
        Self {
            enabled: false,
            window_seconds: 0,
        }
    }
}

/// A complete declarative alert definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Stable alert identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Disabled alerts are never evaluated on schedule.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Evaluation schedule.
    pub schedule: Schedule,
    /// The query feeding the conditions.
    pub source: AlertSource,
    /// Threshold conditions, AND-ed together.
    pub conditions: Vec<Condition>,
    /// Recipient resolution.
    pub recipients: RecipientSpec,
    /// Delivery settings.
    pub notification: NotificationSpec,
    /// Suppression window.
    #[serde(default)]
    pub cooldown: Cooldown,
}

fn default_enabled() -> bool {
    true
}

impl AlertConfig {
    /// Validates the config; malformed definitions are rejected before any
    /// schedule fires.
    pub fn validate(&self) -> Result<(), CascadeError> {
        let fail = |reason: String| {
            Err(CascadeError::InvalidAlertConfig {
                alert: self.id.clone(),
                reason,
            })
        };

        if self.id.trim().is_empty() {
            return fail("alert id is empty".to_string());
        }
        if self.name.trim().is_empty() {
            return fail("alert name is empty".to_string());
        }
        if self.schedule.cron.trim().is_empty() {
            return fail("schedule cron expression is empty".to_string());
        }
        if self.source.query.trim().is_empty() {
            return fail("source query is empty".to_string());
        }
        if self.conditions.is_empty() {
            return fail("alert has no conditions".to_string());
        }
        if self.notification.channels.is_empty() {
            return fail("alert has no notification channels".to_string());
        }
        if self.cooldown.enabled && self.cooldown.window_seconds == 0 {
            return fail("cooldown is enabled with a zero window".to_string());
        }
        if let RecipientSpec::Custom { emails } = &self.recipients {
            if emails.is_empty() {
                return fail("custom recipient list is empty".to_string());
            }
        }

        for condition in &self.conditions {
            if condition.field.trim().is_empty() {
                return fail("condition field is empty".to_string());
            }
            match condition.operator {
                ConditionOperator::Between => {
                    let ok = condition
                        .value
                        .as_array()
                        .map(|a| a.len() == 2 && a.iter().all(serde_json::Value::is_number))
                        .unwrap_or(false);
                    if !ok {
                        return fail(format!(
                            "between condition on '{}' needs a [min, max] number pair",
                            condition.field
                        ));
                    }
                }
                ConditionOperator::In => {
                    if !condition.value.is_array() {
                        return fail(format!(
                            "in condition on '{}' needs an array value",
                            condition.field
                        ));
                    }
                }
                ConditionOperator::PercentageOfExceeds => {
                    let obj = condition.value.as_object();
                    let ok = obj
                        .map(|o| {
                            o.get("base_field").map_or(false, serde_json::Value::is_string)
                                && o.get("percentage").map_or(false, serde_json::Value::is_number)
                        })
                        .unwrap_or(false);
                    if !ok {
                        return fail(format!(
                            "percentage_of_exceeds condition on '{}' needs {{base_field, percentage}}",
                            condition.field
                        ));
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }
}
