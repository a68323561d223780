//! The level-driving execution engine.

use super::handle::RunHandle;
use super::records::RunOutcome;
use crate::classify::{classify, is_retryable, ErrorClass};
use crate::context::RunContext;
use crate::core::{ErrorContext, RunStatus, StepOutcome, StepStatus};
use crate::plan::{ExecutionPlan, ResolvedStep};
use crate::transitions::TransitionLog;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Executor configuration.
#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    /// Timeout applied to steps that do not declare their own.
    pub default_step_timeout: Duration,
    /// Timeout for the whole run.
    pub run_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_step_timeout: Duration::from_secs(300),
            run_timeout: Duration::from_secs(3600),
        }
    }
}

/// Drives leveled plans through the run/step state machines.
///
/// Levels run strictly in order; a level's steps run concurrently and the
/// executor waits for the whole level before advancing. The cancellation
/// token is polled once per level boundary, so in-flight steps always finish
/// on their own terms.
#[derive(Debug, Clone)]
pub struct PipelineExecutor {
    log: Arc<TransitionLog>,
    config: ExecutorConfig,
}

impl PipelineExecutor {
    /// Creates an executor writing transitions to the given log.
    #[must_use]
    pub fn new(log: Arc<TransitionLog>, config: ExecutorConfig) -> Self {
        Self { log, config }
    }

    /// Creates the pending run handle for a plan without starting it.
    #[must_use]
    pub fn prepare(&self, plan: &ExecutionPlan, ctx: &RunContext) -> Arc<RunHandle> {
        RunHandle::new(
            ctx.identity(),
            ctx.trigger().clone(),
            plan,
            ctx.token().clone(),
            self.log.clone(),
        )
    }

    /// Runs a plan to completion and returns the outcome snapshot.
    pub async fn run(&self, plan: &ExecutionPlan, ctx: Arc<RunContext>) -> RunOutcome {
        let handle = self.prepare(plan, &ctx);
        drive(plan.clone(), ctx, handle.clone(), self.config).await;
        handle.snapshot()
    }

    /// Starts a plan in the background and returns its live handle.
    #[must_use]
    pub fn launch(&self, plan: ExecutionPlan, ctx: Arc<RunContext>) -> Arc<RunHandle> {
        let handle = self.prepare(&plan, &ctx);
        let config = self.config;
        let task_handle = handle.clone();
        tokio::spawn(async move {
            drive(plan, ctx, task_handle, config).await;
        });
        handle
    }
}

/// Executes every level of the plan, updating the handle as it goes.
async fn drive(
    plan: ExecutionPlan,
    ctx: Arc<RunContext>,
    handle: Arc<RunHandle>,
    config: ExecutorConfig,
) {
    info!(
        run_id = %handle.run_id(),
        plan = plan.name(),
        levels = plan.levels().len(),
        "Run starting"
    );
    handle.transition_run(RunStatus::Running, Some("triggered"), None);

    let deadline = tokio::time::Instant::now() + config.run_timeout;

    for (level_idx, level) in plan.levels().iter().enumerate() {
        // Cancellation is polled here and only here.
        if ctx.token().is_requested() {
            let reason = ctx
                .token()
                .reason()
                .unwrap_or_else(|| "cancellation requested".to_string());
            info!(run_id = %handle.run_id(), level = level_idx, reason = %reason, "Run cancelling");

            handle.transition_run(RunStatus::Cancelling, Some(&reason), None);
            skip_from(&plan, level_idx, &handle, "run cancelled before step started");
            handle.transition_run(RunStatus::Cancelled, Some(&reason), None);
            return;
        }

        if tokio::time::Instant::now() >= deadline {
            let err = ErrorContext::with_class(
                format!("run exceeded its {}s timeout", config.run_timeout.as_secs()),
                ErrorClass::Timeout,
            );
            skip_from(&plan, level_idx, &handle, "run timed out before step started");
            handle.transition_run(RunStatus::TimedOut, Some("run timeout"), Some(&err));
            return;
        }

        debug!(run_id = %handle.run_id(), level = level_idx, steps = level.len(), "Level starting");

        let mut join_handles = Vec::with_capacity(level.len());
        let mut abort_handles = Vec::with_capacity(level.len());
        for step in level {
            let task = tokio::spawn(execute_step(
                step.clone(),
                ctx.clone(),
                handle.clone(),
                config.default_step_timeout,
            ));
            abort_handles.push(task.abort_handle());
            join_handles.push((step.spec.name.clone(), task));
        }

        let (names, tasks): (Vec<String>, Vec<_>) = join_handles.into_iter().unzip();
        let joined = futures::future::join_all(tasks);

        match tokio::time::timeout_at(deadline, joined).await {
            Ok(results) => {
                for (name, result) in names.iter().zip(results) {
                    if let Err(e) = result {
                        // A panicking processor is a raised fault like any other.
                        let err = ErrorContext::with_class(
                            format!("step '{name}' panicked"),
                            ErrorClass::Unknown,
                        )
                        .with_trace(e.to_string());
                        handle.transition_step(name, StepStatus::Failed, Some("panic"), Some(&err));
                    }
                }
            }
            Err(_) => {
                for abort in &abort_handles {
                    abort.abort();
                }
                let err = ErrorContext::with_class(
                    format!("run exceeded its {}s timeout", config.run_timeout.as_secs()),
                    ErrorClass::Timeout,
                );
                for name in &names {
                    match handle.step_status(name) {
                        Some(StepStatus::Running | StepStatus::Retrying) => {
                            handle.transition_step(
                                name,
                                StepStatus::TimedOut,
                                Some("run timeout"),
                                Some(&err),
                            );
                        }
                        Some(StepStatus::Pending) => {
                            handle.transition_step(
                                name,
                                StepStatus::Skipped,
                                Some("run timed out before step started"),
                                None,
                            );
                        }
                        _ => {}
                    }
                }
                skip_from(&plan, level_idx + 1, &handle, "run timed out");
                handle.transition_run(RunStatus::TimedOut, Some("run timeout"), Some(&err));
                warn!(run_id = %handle.run_id(), level = level_idx, "Run timed out");
                return;
            }
        }

        // A failed level fails the run; later levels never start.
        let failure = level
            .iter()
            .filter_map(|s| handle.step(&s.spec.name))
            .find(|s| s.status.is_failure());

        if let Some(failed_step) = failure {
            let err = failed_step.error.clone().unwrap_or_else(|| {
                ErrorContext::with_class(
                    format!("step '{}' failed", failed_step.name),
                    ErrorClass::Unknown,
                )
            });
            let (to, reason) = if failed_step.status == StepStatus::TimedOut {
                (RunStatus::TimedOut, format!("step '{}' timed out", failed_step.name))
            } else {
                (RunStatus::Failed, format!("step '{}' failed", failed_step.name))
            };

            skip_from(&plan, level_idx + 1, &handle, &reason);
            handle.transition_run(to, Some(&reason), Some(&err));
            warn!(
                run_id = %handle.run_id(),
                step = %failed_step.name,
                error = %err.message,
                "Run failed"
            );
            return;
        }
    }

    // A request that raced the final level is still honored: the run ends
    // cancelled, not completed.
    if ctx.token().is_requested() {
        let reason = ctx
            .token()
            .reason()
            .unwrap_or_else(|| "cancellation requested".to_string());
        handle.transition_run(RunStatus::Cancelling, Some(&reason), None);
        handle.transition_run(RunStatus::Cancelled, Some(&reason), None);
        info!(run_id = %handle.run_id(), "Run cancelled after final level");
        return;
    }

    handle.transition_run(RunStatus::Completed, Some("all levels completed"), None);
    info!(run_id = %handle.run_id(), "Run completed");
}

/// Marks every step of levels `from_level..` as skipped.
fn skip_from(plan: &ExecutionPlan, from_level: usize, handle: &Arc<RunHandle>, reason: &str) {
    for level in plan.levels().iter().skip(from_level) {
        for step in level {
            handle.transition_step(&step.spec.name, StepStatus::Skipped, Some(reason), None);
        }
    }
}

/// Executes one step, including its timeout and retry loop.
async fn execute_step(
    step: ResolvedStep,
    ctx: Arc<RunContext>,
    handle: Arc<RunHandle>,
    default_timeout: Duration,
) {
    let name = step.spec.name.clone();
    let timeout = step.spec.timeout.unwrap_or(default_timeout);

    handle.transition_step(&name, StepStatus::Running, Some("level started"), None);

    let mut attempt: u32 = 1;
    loop {
        let outcome = match tokio::time::timeout(timeout, step.processor.execute(&step.spec, &ctx))
            .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                let err = ErrorContext::with_class(
                    format!("step '{name}' exceeded its {}s timeout", timeout.as_secs()),
                    ErrorClass::Timeout,
                )
                .with_retry_count(attempt - 1);
                handle.transition_step(&name, StepStatus::TimedOut, Some("step timeout"), Some(&err));
                return;
            }
        };

        match outcome {
            StepOutcome::Success { data } => {
                if let Err(conflict) = ctx.publish(&name, data) {
                    let err = ErrorContext::with_class(conflict.to_string(), ErrorClass::Validation)
                        .with_retry_count(attempt - 1);
                    handle.transition_step(&name, StepStatus::Failed, Some("output conflict"), Some(&err));
                    return;
                }
                handle.transition_step(&name, StepStatus::Completed, None, None);
                return;
            }
            StepOutcome::Failure { error, class } => {
                let class = class.unwrap_or_else(|| classify(&error));

                let retry = step.spec.retry.filter(|policy| {
                    is_retryable(class) && attempt < policy.max_attempts
                });

                if let Some(policy) = retry {
                    let delay = policy.delay(attempt);
                    debug!(
                        step = %name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Transient step failure, retrying"
                    );

                    let err = ErrorContext::with_class(error, class).with_retry_count(attempt);
                    handle.transition_step(&name, StepStatus::Retrying, Some("transient failure"), Some(&err));
                    tokio::time::sleep(delay).await;
                    handle.transition_step(&name, StepStatus::Running, Some("retry attempt"), None);
                    attempt += 1;
                    continue;
                }

                let err = ErrorContext::with_class(error, class).with_retry_count(attempt - 1);
                handle.transition_step(&name, StepStatus::Failed, None, Some(&err));
                return;
            }
        }
    }
}
