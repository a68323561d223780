//! Pipeline execution: run/step records, the shared run handle, and the
//! level-driving engine.

mod engine;
mod handle;
mod records;

pub use engine::{ExecutorConfig, PipelineExecutor};
pub use handle::RunHandle;
pub use records::{PipelineRun, RunOutcome, StepRun};
