//! Identifier generation for runs and steps.

use uuid::Uuid;

/// Generates a new run identifier (UUID v4).
#[must_use]
pub fn generate_run_id() -> Uuid {
    Uuid::new_v4()
}

/// Generates a new step-run identifier (UUID v4).
#[must_use]
pub fn generate_step_id() -> Uuid {
    Uuid::new_v4()
}
