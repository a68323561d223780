//! The execution context shared by all steps of a run.

use super::identity::{RunIdentity, TriggerInfo};
use crate::cancellation::CancellationToken;
use crate::errors::OutputConflictError;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared context for one pipeline run.
///
/// Trigger parameters are read-only. Step outputs are write-once per step
/// name: the executor publishes each step's output under its name, and no
/// step may overwrite another step's entry. Steps read prior outputs through
/// [`RunContext::output_of`].
#[derive(Debug)]
pub struct RunContext {
    identity: RunIdentity,
    trigger: TriggerInfo,
    params: HashMap<String, serde_json::Value>,
    outputs: DashMap<String, HashMap<String, serde_json::Value>>,
    token: Arc<CancellationToken>,
}

impl RunContext {
    /// Creates a new run context.
    #[must_use]
    pub fn new(identity: RunIdentity, trigger: TriggerInfo) -> Self {
        Self {
            identity,
            trigger,
            params: HashMap::new(),
            outputs: DashMap::new(),
            token: Arc::new(CancellationToken::new()),
        }
    }

    /// Sets the trigger parameters.
    #[must_use]
    pub fn with_params(mut self, params: HashMap<String, serde_json::Value>) -> Self {
        self.params = params;
        self
    }

    /// Uses an externally owned cancellation token.
    #[must_use]
    pub fn with_token(mut self, token: Arc<CancellationToken>) -> Self {
        self.token = token;
        self
    }

    /// Returns the run identity.
    #[must_use]
    pub fn identity(&self) -> &RunIdentity {
        &self.identity
    }

    /// Returns the trigger metadata.
    #[must_use]
    pub fn trigger(&self) -> &TriggerInfo {
        &self.trigger
    }

    /// Returns a trigger parameter.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&serde_json::Value> {
        self.params.get(key)
    }

    /// Returns the cancellation token.
    #[must_use]
    pub fn token(&self) -> &Arc<CancellationToken> {
        &self.token
    }

    /// Publishes a step's output under its name.
    ///
    /// Write-once: publishing a second time for the same step is a conflict.
    pub fn publish(
        &self,
        step_name: &str,
        data: HashMap<String, serde_json::Value>,
    ) -> Result<(), OutputConflictError> {
        match self.outputs.entry(step_name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(OutputConflictError::new(step_name, step_name))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(data);
                Ok(())
            }
        }
    }

    /// Returns the published output of a step, if it has produced one.
    #[must_use]
    pub fn output_of(&self, step_name: &str) -> Option<HashMap<String, serde_json::Value>> {
        self.outputs.get(step_name).map(|entry| entry.value().clone())
    }
}
