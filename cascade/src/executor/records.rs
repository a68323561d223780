//! Run and step execution records.

use crate::context::TriggerInfo;
use crate::core::{ErrorContext, RunStatus, StepStatus};
use crate::plan::StepKind;
use crate::utils::{generate_step_id, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The durable record of one pipeline run.
///
/// Mutated only by the executor; immutable once terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Run identifier.
    pub id: Uuid,
    /// Name of the executed plan.
    pub plan_name: String,
    /// The tenant the run belongs to.
    pub tenant_id: String,
    /// Current status.
    pub status: RunStatus,
    /// How the run was triggered.
    pub trigger: TriggerInfo,
    /// When the run left `Pending`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    /// When the run reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<Timestamp>,
    /// Terminal error summary, for failed or timed-out runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorContext>,
}

impl PipelineRun {
    /// Creates a pending run record.
    #[must_use]
    pub fn new(
        id: Uuid,
        plan_name: impl Into<String>,
        tenant_id: impl Into<String>,
        trigger: TriggerInfo,
    ) -> Self {
        Self {
            id,
            plan_name: plan_name.into(),
            tenant_id: tenant_id.into(),
            status: RunStatus::Pending,
            trigger,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }
}

/// The durable record of one step within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRun {
    /// Step-run identifier.
    pub id: Uuid,
    /// The run this step belongs to.
    pub run_id: Uuid,
    /// Step name within the plan.
    pub name: String,
    /// The kind of work.
    pub kind: StepKind,
    /// Current status.
    pub status: StepStatus,
    /// When the step left `Pending`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    /// When the step reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<Timestamp>,
    /// Error context for failed or timed-out steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorContext>,
    /// Retries performed.
    #[serde(default)]
    pub retry_count: u32,
}

impl StepRun {
    /// Creates a pending step record.
    #[must_use]
    pub fn new(run_id: Uuid, name: impl Into<String>, kind: StepKind) -> Self {
        Self {
            id: generate_step_id(),
            run_id,
            name: name.into(),
            kind,
            status: StepStatus::Pending,
            started_at: None,
            finished_at: None,
            error: None,
            retry_count: 0,
        }
    }
}

/// Snapshot of a finished (or in-flight) run and its steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    /// The run record.
    pub run: PipelineRun,
    /// Step records in plan order.
    pub steps: Vec<StepRun>,
}

impl RunOutcome {
    /// Returns the step record with the given name.
    #[must_use]
    pub fn step(&self, name: &str) -> Option<&StepRun> {
        self.steps.iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TriggerKind;

    #[test]
    fn test_new_run_is_pending() {
        let run = PipelineRun::new(
            Uuid::new_v4(),
            "nightly",
            "tenant-1",
            TriggerInfo::new(TriggerKind::Scheduled),
        );

        assert_eq!(run.status, RunStatus::Pending);
        assert!(run.started_at.is_none());
        assert!(run.error.is_none());
    }

    #[test]
    fn test_new_step_is_pending() {
        let run_id = Uuid::new_v4();
        let step = StepRun::new(run_id, "extract", StepKind::Ingest);

        assert_eq!(step.run_id, run_id);
        assert_eq!(step.status, StepStatus::Pending);
        assert_eq!(step.retry_count, 0);
    }

    #[test]
    fn test_outcome_step_lookup() {
        let run_id = Uuid::new_v4();
        let outcome = RunOutcome {
            run: PipelineRun::new(
                run_id,
                "p",
                "t",
                TriggerInfo::new(TriggerKind::Manual),
            ),
            steps: vec![StepRun::new(run_id, "a", StepKind::Ingest)],
        };

        assert!(outcome.step("a").is_some());
        assert!(outcome.step("b").is_none());
    }
}
