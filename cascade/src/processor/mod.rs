//! The processor contract.
//!
//! A processor is the opaque unit of work executed for a step. It reports
//! its result exclusively through [`StepOutcome`] — there is no separate
//! error channel to forget to check. A processor that panics is caught at
//! the task join point and normalized into a failure by the executor.

use crate::context::RunContext;
use crate::core::StepOutcome;
use crate::plan::{StepKind, StepSpec};
use async_trait::async_trait;
use std::fmt::Debug;

/// Trait for step processors.
#[async_trait]
pub trait Processor: Send + Sync + Debug {
    /// The step kind this processor handles.
    fn kind(&self) -> StepKind;

    /// Executes one step.
    ///
    /// # Arguments
    ///
    /// * `step` - The step's specification, including its config
    /// * `ctx` - The shared run context
    async fn execute(&self, step: &StepSpec, ctx: &RunContext) -> StepOutcome;
}

/// A processor that always succeeds with no output.
#[derive(Debug, Clone)]
pub struct NoOpProcessor {
    kind: StepKind,
}

impl NoOpProcessor {
    /// Creates a no-op processor for the given kind.
    #[must_use]
    pub fn new(kind: StepKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl Processor for NoOpProcessor {
    fn kind(&self) -> StepKind {
        self.kind
    }

    async fn execute(&self, _step: &StepSpec, _ctx: &RunContext) -> StepOutcome {
        StepOutcome::success_empty()
    }
}
