//! Shared, live view of a run under execution.

use super::records::{PipelineRun, RunOutcome, StepRun};
use crate::cancellation::CancellationToken;
use crate::context::{RunIdentity, TriggerInfo};
use crate::core::{ErrorContext, RunStatus, StepStatus};
use crate::plan::ExecutionPlan;
use crate::transitions::{EntityKind, StateTransition, TransitionLog};
use crate::utils::now_utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Notify;
use tracing::warn;
use uuid::Uuid;

/// Live state of one run: the run record, its step records, the cancellation
/// token, and the transition emission machinery.
///
/// The executor is the only writer. Readers (the control surface, tests) see
/// consistent snapshots. Illegal transitions — anything leaving a terminal
/// state — are refused and logged, never applied.
pub struct RunHandle {
    run: RwLock<PipelineRun>,
    steps: RwLock<HashMap<String, StepRun>>,
    step_order: Vec<String>,
    token: Arc<CancellationToken>,
    log: Arc<TransitionLog>,
    seq: AtomicU32,
    run_since: RwLock<Instant>,
    step_since: RwLock<HashMap<String, Instant>>,
    terminal: Notify,
}

impl RunHandle {
    /// Creates a handle with pending records for the run and every planned
    /// step.
    #[must_use]
    pub fn new(
        identity: &RunIdentity,
        trigger: TriggerInfo,
        plan: &ExecutionPlan,
        token: Arc<CancellationToken>,
        log: Arc<TransitionLog>,
    ) -> Arc<Self> {
        let run = PipelineRun::new(
            identity.run_id,
            identity.plan_name.clone(),
            identity.tenant_id.clone(),
            trigger,
        );

        let mut steps = HashMap::new();
        let mut step_order = Vec::new();
        let mut step_since = HashMap::new();
        let now = Instant::now();

        for level in plan.levels() {
            for step in level {
                let record = StepRun::new(identity.run_id, step.spec.name.clone(), step.spec.kind);
                step_order.push(step.spec.name.clone());
                step_since.insert(step.spec.name.clone(), now);
                steps.insert(step.spec.name.clone(), record);
            }
        }

        Arc::new(Self {
            run: RwLock::new(run),
            steps: RwLock::new(steps),
            step_order,
            token,
            log,
            seq: AtomicU32::new(0),
            run_since: RwLock::new(now),
            step_since: RwLock::new(step_since),
            terminal: Notify::new(),
        })
    }

    /// Returns the run id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run.read().id
    }

    /// Returns the current run status.
    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.run.read().status
    }

    /// Returns the current status of a step.
    #[must_use]
    pub fn step_status(&self, name: &str) -> Option<StepStatus> {
        self.steps.read().get(name).map(|s| s.status)
    }

    /// Returns a copy of a step record.
    #[must_use]
    pub fn step(&self, name: &str) -> Option<StepRun> {
        self.steps.read().get(name).cloned()
    }

    /// Returns the cancellation token.
    #[must_use]
    pub fn token(&self) -> &Arc<CancellationToken> {
        &self.token
    }

    /// Requests cancellation of this run.
    ///
    /// Idempotent; a terminal run is unaffected.
    pub fn cancel(&self, reason: impl Into<String>) {
        self.token.request(reason);
    }

    /// Returns a consistent snapshot of the run and its steps in plan order.
    #[must_use]
    pub fn snapshot(&self) -> RunOutcome {
        let run = self.run.read().clone();
        let steps = self.steps.read();
        let steps = self
            .step_order
            .iter()
            .filter_map(|name| steps.get(name).cloned())
            .collect();

        RunOutcome { run, steps }
    }

    /// Waits until the run reaches a terminal status.
    pub async fn wait_terminal(&self) -> RunStatus {
        loop {
            let notified = self.terminal.notified();
            tokio::pin!(notified);

            let status = self.status();
            if status.is_terminal() {
                return status;
            }

            notified.await;
        }
    }

    /// Moves the run to a new status, emitting the transition.
    ///
    /// Returns false (and applies nothing) if the transition is illegal.
    pub(crate) fn transition_run(
        &self,
        to: RunStatus,
        reason: Option<&str>,
        error: Option<&ErrorContext>,
    ) -> bool {
        let (from, run_id) = {
            let mut run = self.run.write();
            let from = run.status;

            if !from.can_transition_to(to) {
                warn!(run_id = %run.id, %from, %to, "Refusing illegal run transition");
                return false;
            }

            run.status = to;
            if to == RunStatus::Running {
                run.started_at = Some(now_utc());
            }
            if to.is_terminal() {
                run.finished_at = Some(now_utc());
                if let Some(err) = error {
                    run.error = Some(err.clone());
                }
            }
            (from, run.id)
        };

        let duration_ms = {
            let mut since = self.run_since.write();
            let elapsed = since.elapsed().as_millis() as u64;
            *since = Instant::now();
            elapsed
        };

        self.emit(EntityKind::Run, run_id, from.to_string(), to.to_string(), reason, error, duration_ms, 0);

        if to.is_terminal() {
            self.terminal.notify_waiters();
        }
        true
    }

    /// Moves a step to a new status, emitting the transition.
    ///
    /// Returns false (and applies nothing) if the step is unknown or the
    /// transition is illegal.
    pub(crate) fn transition_step(
        &self,
        name: &str,
        to: StepStatus,
        reason: Option<&str>,
        error: Option<&ErrorContext>,
    ) -> bool {
        let (from, step_id, retry_count) = {
            let mut steps = self.steps.write();
            let Some(step) = steps.get_mut(name) else {
                warn!(step = %name, "Refusing transition for unknown step");
                return false;
            };
            let from = step.status;

            if !from.can_transition_to(to) {
                warn!(step = %name, %from, %to, "Refusing illegal step transition");
                return false;
            }

            step.status = to;
            if to == StepStatus::Running && step.started_at.is_none() {
                step.started_at = Some(now_utc());
            }
            if to.is_terminal() {
                step.finished_at = Some(now_utc());
                if let Some(err) = error {
                    step.error = Some(err.clone());
                }
            }
            if let Some(err) = error {
                step.retry_count = err.retry_count;
            }
            (from, step.id, step.retry_count)
        };

        let duration_ms = {
            let mut since = self.step_since.write();
            let slot = since.entry(name.to_string()).or_insert_with(Instant::now);
            let elapsed = slot.elapsed().as_millis() as u64;
            *slot = Instant::now();
            elapsed
        };

        self.emit(
            EntityKind::Step,
            step_id,
            from.to_string(),
            to.to_string(),
            reason,
            error,
            duration_ms,
            retry_count,
        );
        true
    }

    #[allow(clippy::too_many_arguments)]
    fn emit(
        &self,
        entity_kind: EntityKind,
        entity_id: Uuid,
        from: String,
        to: String,
        reason: Option<&str>,
        error: Option<&ErrorContext>,
        duration_ms: u64,
        retry_count: u32,
    ) {
        let sequence = self.seq.fetch_add(1, Ordering::SeqCst);
        let mut record = StateTransition::new(entity_kind, entity_id, from, to, sequence)
            .with_duration_ms(duration_ms);

        if let Some(reason) = reason {
            record = record.with_reason(reason);
        }
        if let Some(err) = error {
            record = record.with_error(err);
        }
        record.retry_count = retry_count;

        self.log.record(record);
    }
}

impl std::fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHandle")
            .field("run_id", &self.run_id())
            .field("status", &self.status())
            .finish()
    }
}
