//! Plan and step specifications.

use crate::classify::RetryPolicy;
use crate::errors::PlanValidationError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

/// The kind of work a step performs.
///
/// Processors are registered against these kinds; a plan referencing a kind
/// without a registered processor is rejected at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Pulls raw data in from a source.
    Ingest,
    /// Reshapes or normalizes data.
    Transform,
    /// Rolls data up across a dimension.
    Aggregate,
    /// Checks data quality gates.
    Quality,
    /// Writes results out to a destination.
    Export,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingest => write!(f, "ingest"),
            Self::Transform => write!(f, "transform"),
            Self::Aggregate => write!(f, "aggregate"),
            Self::Quality => write!(f, "quality"),
            Self::Export => write!(f, "export"),
        }
    }
}

/// Specification for a single step in a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    /// The unique name of the step within its plan.
    pub name: String,
    /// The kind of work, resolved to a processor at build time.
    pub kind: StepKind,
    /// Names of steps this step depends on.
    #[serde(default)]
    pub depends_on: HashSet<String>,
    /// Opaque processor configuration.
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
    /// Per-step timeout; the executor's default applies when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
    /// Retry policy for transient failures; no retry when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
}

impl StepSpec {
    /// Creates a new step specification.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: StepKind) -> Self {
        Self {
            name: name.into(),
            kind,
            depends_on: HashSet::new(),
            config: HashMap::new(),
            timeout: None,
            retry: None,
        }
    }

    /// Sets the dependencies.
    #[must_use]
    pub fn depends_on(mut self, deps: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the processor configuration.
    #[must_use]
    pub fn with_config(mut self, config: HashMap<String, serde_json::Value>) -> Self {
        self.config = config;
        self
    }

    /// Sets the per-step timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Enables retry for transient failures.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Validates the step specification.
    pub fn validate(&self) -> Result<(), PlanValidationError> {
        if self.name.trim().is_empty() {
            return Err(PlanValidationError::new("Step name cannot be empty"));
        }
        if self.depends_on.contains(&self.name) {
            return Err(PlanValidationError::new(format!(
                "Step '{}' cannot depend on itself",
                self.name
            ))
            .with_steps(vec![self.name.clone()]));
        }
        Ok(())
    }
}

/// Specification for an entire plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSpec {
    /// The plan name.
    pub name: String,
    /// The steps, in declaration order.
    #[serde(default)]
    pub steps: Vec<StepSpec>,
}

impl PlanSpec {
    /// Creates a new plan specification.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or whitespace-only.
    pub fn new(name: impl Into<String>) -> Result<Self, PlanValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(PlanValidationError::new(
                "Plan name cannot be empty or whitespace-only",
            ));
        }

        Ok(Self {
            name,
            steps: Vec::new(),
        })
    }

    /// Adds a step.
    #[must_use]
    pub fn step(mut self, step: StepSpec) -> Self {
        self.steps.push(step);
        self
    }

    /// Validates names, self-dependencies, and dependency references.
    pub fn validate(&self) -> Result<(), PlanValidationError> {
        if self.steps.is_empty() {
            return Err(PlanValidationError::new(format!(
                "Plan '{}' has no steps",
                self.name
            )));
        }

        let mut names: HashSet<&str> = HashSet::new();
        for step in &self.steps {
            step.validate()?;
            if !names.insert(step.name.as_str()) {
                return Err(PlanValidationError::new(format!(
                    "Duplicate step name '{}'",
                    step.name
                ))
                .with_steps(vec![step.name.clone()]));
            }
        }

        for step in &self.steps {
            for dep in &step.depends_on {
                if !names.contains(dep.as_str()) {
                    return Err(PlanValidationError::new(format!(
                        "Step '{}' depends on unknown step '{dep}'",
                        step.name
                    ))
                    .with_steps(vec![step.name.clone(), dep.clone()]));
                }
            }
        }

        Ok(())
    }
}
