//! Run context: identity, trigger metadata, and cross-step data flow.

mod identity;
mod run_context;

pub use identity::{RunIdentity, TriggerInfo, TriggerKind};
pub use run_context::RunContext;
