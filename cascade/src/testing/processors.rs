//! Processor fakes.

use crate::context::RunContext;
use crate::core::{RawProcessorResult, StepOutcome};
use crate::plan::{StepKind, StepSpec};
use crate::processor::Processor;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Returns the same outcome for every step.
#[derive(Debug)]
pub struct StaticProcessor {
    kind: StepKind,
    outcome: StepOutcome,
}

impl StaticProcessor {
    /// Creates a processor that always returns `outcome`.
    #[must_use]
    pub fn new(kind: StepKind, outcome: StepOutcome) -> Self {
        Self { kind, outcome }
    }

    /// Creates a processor that always succeeds.
    #[must_use]
    pub fn succeeding(kind: StepKind) -> Self {
        Self::new(kind, StepOutcome::success_empty())
    }

    /// Creates a processor that always fails with the given message.
    #[must_use]
    pub fn failing(kind: StepKind, error: impl Into<String>) -> Self {
        Self::new(kind, StepOutcome::failure(error))
    }
}

#[async_trait]
impl Processor for StaticProcessor {
    fn kind(&self) -> StepKind {
        self.kind
    }

    async fn execute(&self, _step: &StepSpec, _ctx: &RunContext) -> StepOutcome {
        self.outcome.clone()
    }
}

/// Replays scripted raw results keyed by step name.
///
/// Each entry is the loose JSON document a legacy processor would return;
/// it goes through [`RawProcessorResult::into_outcome`] exactly like a real
/// wire result would. Steps without an entry succeed with no data.
#[derive(Debug)]
pub struct ScriptedProcessor {
    kind: StepKind,
    script: HashMap<String, serde_json::Value>,
}

impl ScriptedProcessor {
    /// Creates an empty script for the given kind.
    #[must_use]
    pub fn new(kind: StepKind) -> Self {
        Self {
            kind,
            script: HashMap::new(),
        }
    }

    /// Scripts the raw result for a step name.
    #[must_use]
    pub fn with_result(mut self, step_name: impl Into<String>, raw: serde_json::Value) -> Self {
        self.script.insert(step_name.into(), raw);
        self
    }
}

#[async_trait]
impl Processor for ScriptedProcessor {
    fn kind(&self) -> StepKind {
        self.kind
    }

    async fn execute(&self, step: &StepSpec, _ctx: &RunContext) -> StepOutcome {
        let Some(raw) = self.script.get(&step.name) else {
            return StepOutcome::success_empty();
        };

        match serde_json::from_value::<RawProcessorResult>(raw.clone()) {
            Ok(result) => result.into_outcome(),
            Err(e) => StepOutcome::failure(format!("malformed processor result: {e}")),
        }
    }
}

/// Sleeps for a fixed duration, then succeeds.
#[derive(Debug)]
pub struct SleepyProcessor {
    kind: StepKind,
    sleep: Duration,
}

impl SleepyProcessor {
    /// Creates a processor that sleeps for `sleep` before succeeding.
    #[must_use]
    pub fn new(kind: StepKind, sleep: Duration) -> Self {
        Self { kind, sleep }
    }
}

#[async_trait]
impl Processor for SleepyProcessor {
    fn kind(&self) -> StepKind {
        self.kind
    }

    async fn execute(&self, _step: &StepSpec, _ctx: &RunContext) -> StepOutcome {
        tokio::time::sleep(self.sleep).await;
        StepOutcome::success_empty()
    }
}

/// Fails with a transient error a fixed number of times, then succeeds.
#[derive(Debug)]
pub struct FlakyProcessor {
    kind: StepKind,
    failures: u32,
    calls: AtomicU32,
}

impl FlakyProcessor {
    /// Creates a processor whose first `failures` calls fail.
    #[must_use]
    pub fn new(kind: StepKind, failures: u32) -> Self {
        Self {
            kind,
            failures,
            calls: AtomicU32::new(0),
        }
    }

    /// Returns how many times the processor was called.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Processor for FlakyProcessor {
    fn kind(&self) -> StepKind {
        self.kind
    }

    async fn execute(&self, _step: &StepSpec, _ctx: &RunContext) -> StepOutcome {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            StepOutcome::failure("connection reset by peer")
        } else {
            StepOutcome::success_empty()
        }
    }
}

/// Records the order steps were executed in, then succeeds.
#[derive(Debug, Default)]
pub struct RecordingProcessor {
    kind: Option<StepKind>,
    executed: Arc<Mutex<Vec<String>>>,
}

impl RecordingProcessor {
    /// Creates a recording processor for the given kind.
    #[must_use]
    pub fn new(kind: StepKind) -> Self {
        Self {
            kind: Some(kind),
            executed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns the shared execution record.
    #[must_use]
    pub fn executed(&self) -> Arc<Mutex<Vec<String>>> {
        self.executed.clone()
    }
}

#[async_trait]
impl Processor for RecordingProcessor {
    fn kind(&self) -> StepKind {
        self.kind.unwrap_or(StepKind::Transform)
    }

    async fn execute(&self, step: &StepSpec, _ctx: &RunContext) -> StepOutcome {
        self.executed.lock().push(step.name.clone());
        StepOutcome::success_empty()
    }
}
