//! Step outcome types.
//!
//! `StepOutcome` is the single discriminated result every processor returns:
//! a step either succeeded with data or failed with an error. There is no
//! third channel. `RawProcessorResult` exists for processors that hand back a
//! loose JSON document (the legacy wire contract); normalizing it through
//! [`RawProcessorResult::into_outcome`] guarantees a returned `"FAILED"`
//! status is handled exactly like a raised fault.

use crate::classify::ErrorClass;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The outcome of a step execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    /// The step succeeded.
    Success {
        /// Output data published to the run context under the step's name.
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        data: HashMap<String, serde_json::Value>,
    },
    /// The step failed.
    Failure {
        /// Human-readable error message.
        error: String,
        /// Classification hint supplied by the processor, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        class: Option<ErrorClass>,
    },
}

impl StepOutcome {
    /// Creates a successful outcome with data.
    #[must_use]
    pub fn success(data: HashMap<String, serde_json::Value>) -> Self {
        Self::Success { data }
    }

    /// Creates a successful outcome with no data.
    #[must_use]
    pub fn success_empty() -> Self {
        Self::Success {
            data: HashMap::new(),
        }
    }

    /// Creates a successful outcome with a single value.
    #[must_use]
    pub fn success_value(key: impl Into<String>, value: serde_json::Value) -> Self {
        let mut data = HashMap::new();
        data.insert(key.into(), value);
        Self::Success { data }
    }

    /// Creates a failure outcome with an error message.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
            class: None,
        }
    }

    /// Creates a failure outcome with a classification hint.
    #[must_use]
    pub fn failure_with_class(error: impl Into<String>, class: ErrorClass) -> Self {
        Self::Failure {
            error: error.into(),
            class: Some(class),
        }
    }

    /// Returns true if the outcome is a success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns true if the outcome is a failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    /// Returns the error message for failures.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failure { error, .. } => Some(error),
            Self::Success { .. } => None,
        }
    }

    /// Returns the output data for successes, or an empty map.
    #[must_use]
    pub fn data_or_empty(&self) -> HashMap<String, serde_json::Value> {
        match self {
            Self::Success { data } => data.clone(),
            Self::Failure { .. } => HashMap::new(),
        }
    }
}

/// The loose result shape of the legacy processor wire contract.
///
/// `{status: "SUCCESS"|"FAILED", error?, error_type?, ...domain fields}`.
/// A missing `status` defaults to `SUCCESS` for backward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawProcessorResult {
    /// The declared status field; absent means success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Error message carried alongside a failed status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Classification hint carried alongside a failed status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorClass>,
    /// All remaining domain fields.
    #[serde(flatten)]
    pub fields: HashMap<String, serde_json::Value>,
}

impl RawProcessorResult {
    /// Normalizes the loose result into a [`StepOutcome`].
    ///
    /// A `status` of `"FAILED"` (case-insensitive) becomes a failure carrying
    /// the result's error message; anything else, including a missing status,
    /// becomes a success carrying the domain fields.
    #[must_use]
    pub fn into_outcome(self) -> StepOutcome {
        let failed = self
            .status
            .as_deref()
            .map(|s| s.eq_ignore_ascii_case("FAILED"))
            .unwrap_or(false);

        if failed {
            StepOutcome::Failure {
                error: self
                    .error
                    .unwrap_or_else(|| "processor reported FAILED without an error message".to_string()),
                class: self.error_type,
            }
        } else {
            StepOutcome::Success { data: self.fields }
        }
    }
}
