//! Run and step status enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The execution status of a pipeline run.
///
/// `Pending → Running → {Completed | Failed | TimedOut | Cancelling → Cancelled}`.
/// Terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run created, not yet started.
    Pending,
    /// Run is executing levels.
    Running,
    /// Cancellation acknowledged; in-flight steps are finishing.
    Cancelling,
    /// All levels completed successfully.
    Completed,
    /// A step failed and later levels were skipped.
    Failed,
    /// The run or a step exceeded its timeout.
    TimedOut,
    /// Cancellation completed.
    Cancelled,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Cancelling => write!(f, "cancelling"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::TimedOut => write!(f, "timed_out"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl RunStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::TimedOut | Self::Cancelled
        )
    }

    /// Returns true if the status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns true if the transition to `next` is legal.
    ///
    /// Transitions are monotonic: a terminal state is never left.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Running | Self::Cancelled),
            Self::Running => matches!(
                next,
                Self::Completed | Self::Failed | Self::TimedOut | Self::Cancelling
            ),
            Self::Cancelling => matches!(next, Self::Cancelled),
            _ => false,
        }
    }
}

/// The execution status of a single step within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Step not yet started.
    Pending,
    /// Step is executing.
    Running,
    /// A transient failure occurred and the step is waiting to re-run.
    Retrying,
    /// Step finished successfully.
    Completed,
    /// Step failed.
    Failed,
    /// Step exceeded its timeout.
    TimedOut,
    /// Step never started because the run failed or was cancelled first.
    Skipped,
}

impl Default for StepStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Retrying => write!(f, "retrying"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::TimedOut => write!(f, "timed_out"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl StepStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::TimedOut | Self::Skipped
        )
    }

    /// Returns true if the status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }

    /// Returns true if the status indicates failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::TimedOut)
    }

    /// Returns true if the transition to `next` is legal.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Running | Self::Skipped),
            Self::Running => matches!(
                next,
                Self::Completed | Self::Failed | Self::TimedOut | Self::Retrying
            ),
            Self::Retrying => matches!(next, Self::Running | Self::Failed | Self::TimedOut),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_display() {
        assert_eq!(RunStatus::Running.to_string(), "running");
        assert_eq!(RunStatus::TimedOut.to_string(), "timed_out");
        assert_eq!(RunStatus::Cancelling.to_string(), "cancelling");
    }

    #[test]
    fn test_run_status_terminal() {
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::TimedOut.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(!RunStatus::Cancelling.is_terminal());
    }

    #[test]
    fn test_run_status_monotonic() {
        assert!(RunStatus::Pending.can_transition_to(RunStatus::Running));
        assert!(RunStatus::Running.can_transition_to(RunStatus::Cancelling));
        assert!(RunStatus::Cancelling.can_transition_to(RunStatus::Cancelled));

        // Terminal states are never left.
        for terminal in [
            RunStatus::Completed,
            RunStatus::Failed,
            RunStatus::TimedOut,
            RunStatus::Cancelled,
        ] {
            assert!(!terminal.can_transition_to(RunStatus::Running));
            assert!(!terminal.can_transition_to(RunStatus::Pending));
        }
    }

    #[test]
    fn test_step_status_transitions() {
        assert!(StepStatus::Pending.can_transition_to(StepStatus::Running));
        assert!(StepStatus::Pending.can_transition_to(StepStatus::Skipped));
        assert!(StepStatus::Running.can_transition_to(StepStatus::Retrying));
        assert!(StepStatus::Retrying.can_transition_to(StepStatus::Running));
        assert!(!StepStatus::Completed.can_transition_to(StepStatus::Running));
        assert!(!StepStatus::Skipped.can_transition_to(StepStatus::Running));
    }

    #[test]
    fn test_step_status_serialize() {
        let json = serde_json::to_string(&StepStatus::TimedOut).unwrap();
        assert_eq!(json, r#""timed_out""#);

        let back: StepStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, StepStatus::TimedOut);
    }
}
