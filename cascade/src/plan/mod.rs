//! Plan specifications, processor registration, and dependency leveling.

mod levels;
mod registry;
mod spec;

pub use levels::{ExecutionPlan, ResolvedStep};
pub use registry::ProcessorRegistry;
pub use spec::{PlanSpec, StepKind, StepSpec};
