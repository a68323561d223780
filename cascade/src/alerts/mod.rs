//! Alert evaluation: declarative configs, threshold conditions, cooldown,
//! and delivery through the notification registry.

mod conditions;
mod config;
mod engine;
mod history;
mod recipients;
mod scheduler;
mod source;

pub use conditions::{evaluate_condition, evaluate_conditions};
pub use config::{AlertConfig, AlertSource, Condition, ConditionOperator, Cooldown, NotificationSpec, RecipientSpec, Schedule};
pub use engine::{AlertEngine, AlertEvaluation};
pub use history::{AlertHistory, AlertHistoryEntry, AlertOutcome, InMemoryAlertHistory};
pub use recipients::{resolve_recipients, OrgDirectory, StaticOrgDirectory};
pub use scheduler::AlertScheduler;
pub use source::{MetricSource, StaticMetricSource, TenantRow};
