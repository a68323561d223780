//! Processor registration.

use super::spec::StepKind;
use crate::processor::Processor;
use std::collections::HashMap;
use std::sync::Arc;

/// Registration table mapping step kinds to processors.
///
/// Built once at process start from an explicit enumeration of known kinds;
/// plan building resolves against it so an unregistered kind fails before
/// anything executes.
#[derive(Debug, Default, Clone)]
pub struct ProcessorRegistry {
    processors: HashMap<StepKind, Arc<dyn Processor>>,
}

impl ProcessorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a processor for its declared kind.
    ///
    /// Re-registering a kind replaces the previous processor.
    #[must_use]
    pub fn register(mut self, processor: Arc<dyn Processor>) -> Self {
        self.processors.insert(processor.kind(), processor);
        self
    }

    /// Returns the processor for a kind, if registered.
    #[must_use]
    pub fn get(&self, kind: StepKind) -> Option<Arc<dyn Processor>> {
        self.processors.get(&kind).cloned()
    }

    /// Returns the number of registered processors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    /// Returns true if no processors are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}
