//! Error types for the cascade execution core.

use thiserror::Error;

/// The main error type for cascade operations.
#[derive(Debug, Error)]
pub enum CascadeError {
    /// A plan validation error occurred.
    #[error("{0}")]
    Validation(#[from] PlanValidationError),

    /// A cycle was detected in the plan.
    #[error("{0}")]
    CycleDetected(#[from] CycleDetectedError),

    /// A step attempted to publish over an existing context key.
    #[error("{0}")]
    OutputConflict(#[from] OutputConflictError),

    /// No processor is registered for a step kind.
    #[error("No processor registered for step kind '{kind}' (step '{step}')")]
    MissingProcessor {
        /// The step kind without a processor.
        kind: String,
        /// The step that requested it.
        step: String,
    },

    /// A run was not found in the run registry.
    #[error("Unknown run: {0}")]
    UnknownRun(String),

    /// An alert configuration failed validation.
    #[error("Invalid alert config '{alert}': {reason}")]
    InvalidAlertConfig {
        /// The alert identifier.
        alert: String,
        /// Why the config was rejected.
        reason: String,
    },

    /// The analytical store query failed.
    #[error("Metric source error: {0}")]
    MetricSource(String),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error raised when plan validation fails.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PlanValidationError {
    /// The error message.
    pub message: String,
    /// The steps involved in the error.
    pub steps: Vec<String>,
}

impl PlanValidationError {
    /// Creates a new plan validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            steps: Vec::new(),
        }
    }

    /// Sets the steps involved.
    #[must_use]
    pub fn with_steps(mut self, steps: Vec<String>) -> Self {
        self.steps = steps;
        self
    }
}

/// Error raised when a cycle is detected in the plan graph.
#[derive(Debug, Clone, Error)]
#[error("Cycle detected in plan: {}", cycle_path.join(" -> "))]
pub struct CycleDetectedError {
    /// The path of steps forming the cycle.
    pub cycle_path: Vec<String>,
}

impl CycleDetectedError {
    /// Creates a new cycle detected error.
    #[must_use]
    pub fn new(cycle_path: Vec<String>) -> Self {
        Self { cycle_path }
    }
}

impl From<CycleDetectedError> for PlanValidationError {
    fn from(err: CycleDetectedError) -> Self {
        PlanValidationError {
            message: err.to_string(),
            steps: err.cycle_path,
        }
    }
}

/// Error raised when a step publishes over an existing context key.
#[derive(Debug, Clone, Error)]
#[error("Output conflict: key '{key}' was already published by step '{owner}'")]
pub struct OutputConflictError {
    /// The conflicting key.
    pub key: String,
    /// The step that owns the key.
    pub owner: String,
}

impl OutputConflictError {
    /// Creates a new output conflict error.
    #[must_use]
    pub fn new(key: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            owner: owner.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_validation_error() {
        let err = PlanValidationError::new("bad plan")
            .with_steps(vec!["a".to_string(), "b".to_string()]);

        assert_eq!(err.to_string(), "bad plan");
        assert_eq!(err.steps.len(), 2);
    }

    #[test]
    fn test_cycle_detected_error() {
        let err = CycleDetectedError::new(vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
        ]);

        assert!(err.to_string().contains("a -> b -> a"));
    }

    #[test]
    fn test_cycle_converts_to_validation() {
        let err: PlanValidationError =
            CycleDetectedError::new(vec!["x".to_string(), "x".to_string()]).into();
        assert_eq!(err.steps, vec!["x".to_string(), "x".to_string()]);
    }

    #[test]
    fn test_missing_processor_display() {
        let err = CascadeError::MissingProcessor {
            kind: "ingest".to_string(),
            step: "extract".to_string(),
        };
        assert!(err.to_string().contains("ingest"));
        assert!(err.to_string().contains("extract"));
    }

    #[test]
    fn test_output_conflict_display() {
        let err = OutputConflictError::new("rows", "extract");
        assert!(err.to_string().contains("rows"));
        assert!(err.to_string().contains("extract"));
    }
}
