//! The operator-facing control surface.
//!
//! One `CascadeService` is constructed at process start with every
//! collaborator injected, then shared by reference. It owns the run
//! registry and fronts the executor and the alert engine.

use crate::alerts::{AlertConfig, AlertEngine, AlertEvaluation};
use crate::context::{RunContext, RunIdentity, TriggerInfo};
use crate::core::RunStatus;
use crate::errors::CascadeError;
use crate::executor::{ExecutorConfig, PipelineExecutor, RunHandle, RunOutcome};
use crate::notify::ProviderRegistry;
use crate::plan::{ExecutionPlan, PlanSpec, ProcessorRegistry};
use crate::transitions::TransitionLog;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// The pipeline service instance.
#[derive(Debug)]
pub struct CascadeService {
    processors: ProcessorRegistry,
    executor: PipelineExecutor,
    providers: Arc<ProviderRegistry>,
    alerts: Arc<AlertEngine>,
    log: Arc<TransitionLog>,
    runs: DashMap<Uuid, Arc<RunHandle>>,
}

impl CascadeService {
    /// Creates the service.
    #[must_use]
    pub fn new(
        processors: ProcessorRegistry,
        providers: Arc<ProviderRegistry>,
        alerts: Arc<AlertEngine>,
        log: Arc<TransitionLog>,
        executor_config: ExecutorConfig,
    ) -> Self {
        let executor = PipelineExecutor::new(log.clone(), executor_config);
        Self {
            processors,
            executor,
            providers,
            alerts,
            log,
            runs: DashMap::new(),
        }
    }

    /// Triggers a run of the given plan and returns its run id.
    ///
    /// The plan is validated and leveled before anything starts; the run
    /// itself executes in the background.
    pub fn trigger(
        &self,
        spec: &PlanSpec,
        tenant_id: &str,
        trigger: TriggerInfo,
        params: HashMap<String, serde_json::Value>,
    ) -> Result<Uuid, CascadeError> {
        let plan = ExecutionPlan::build(spec, &self.processors)?;

        let identity = RunIdentity::new(spec.name.clone(), tenant_id);
        let run_id = identity.run_id;
        let ctx = Arc::new(RunContext::new(identity, trigger).with_params(params));

        let handle = self.executor.launch(plan, ctx);
        self.runs.insert(run_id, handle);

        info!(run_id = %run_id, plan = %spec.name, tenant = %tenant_id, "Run triggered");
        Ok(run_id)
    }

    /// Requests cancellation of a run and reports its status.
    ///
    /// Idempotent: cancelling a terminal run changes nothing and returns the
    /// existing terminal status.
    pub fn cancel(&self, run_id: Uuid, reason: &str) -> Result<RunStatus, CascadeError> {
        let handle = self.handle(run_id)?;

        let status = handle.status();
        if status.is_terminal() {
            return Ok(status);
        }

        handle.cancel(reason);
        Ok(handle.status())
    }

    /// Returns a run's current status.
    pub fn run_status(&self, run_id: Uuid) -> Result<RunStatus, CascadeError> {
        Ok(self.handle(run_id)?.status())
    }

    /// Returns a snapshot of a run and all of its steps.
    pub fn run_outcome(&self, run_id: Uuid) -> Result<RunOutcome, CascadeError> {
        Ok(self.handle(run_id)?.snapshot())
    }

    /// Waits for a run to reach a terminal status.
    pub async fn await_run(&self, run_id: Uuid) -> Result<RunOutcome, CascadeError> {
        let handle = self.handle(run_id)?;
        handle.wait_terminal().await;
        Ok(handle.snapshot())
    }

    /// Evaluates every enabled alert once, on demand.
    pub async fn evaluate_alerts(&self) -> Vec<AlertEvaluation> {
        self.alerts.evaluate_all().await
    }

    /// Tests a single alert config; `dry_run` skips actual delivery.
    pub async fn test_alert(
        &self,
        config: &AlertConfig,
        dry_run: bool,
    ) -> Result<Vec<AlertEvaluation>, CascadeError> {
        self.alerts.test_alert(config, dry_run).await
    }

    /// Returns the alert engine.
    #[must_use]
    pub fn alerts(&self) -> &Arc<AlertEngine> {
        &self.alerts
    }

    /// Returns the notification provider registry.
    #[must_use]
    pub fn providers(&self) -> &Arc<ProviderRegistry> {
        &self.providers
    }

    /// Shuts the service down: closes notification sessions and drains the
    /// transition log.
    pub async fn shutdown(&self) {
        self.providers.shutdown();
        self.log.shutdown(true, Duration::from_secs(5)).await;
        info!("Service shut down");
    }

    fn handle(&self, run_id: Uuid) -> Result<Arc<RunHandle>, CascadeError> {
        self.runs
            .get(&run_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CascadeError::UnknownRun(run_id.to_string()))
    }
}
