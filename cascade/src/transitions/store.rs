//! Transition persistence trait and the in-memory store.

use super::record::{StateTransition, TransitionKey};
use crate::errors::CascadeError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashSet;
use uuid::Uuid;

/// Trait for durable transition storage.
///
/// Implementations must be idempotent on the record's [`TransitionKey`]:
/// persisting a batch that contains already-stored records writes only the
/// new ones.
#[async_trait]
pub trait TransitionStore: Send + Sync {
    /// Persists a batch, returning how many records were newly written.
    async fn persist_batch(&self, batch: &[StateTransition]) -> Result<usize, CascadeError>;
}

/// In-memory transition store with write-once dedup.
///
/// The default store, and the one tests inspect.
#[derive(Debug, Default)]
pub struct InMemoryTransitionStore {
    rows: RwLock<Vec<StateTransition>>,
    seen: RwLock<HashSet<TransitionKey>>,
}

impl InMemoryTransitionStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all stored transitions in persistence order.
    #[must_use]
    pub fn all(&self) -> Vec<StateTransition> {
        self.rows.read().clone()
    }

    /// Returns the transitions for one entity, in persistence order.
    #[must_use]
    pub fn for_entity(&self, entity_id: Uuid) -> Vec<StateTransition> {
        self.rows
            .read()
            .iter()
            .filter(|t| t.entity_id == entity_id)
            .cloned()
            .collect()
    }

    /// Returns the number of stored transitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

#[async_trait]
impl TransitionStore for InMemoryTransitionStore {
    async fn persist_batch(&self, batch: &[StateTransition]) -> Result<usize, CascadeError> {
        let mut seen = self.seen.write();
        let mut rows = self.rows.write();

        let mut written = 0;
        for t in batch {
            if seen.insert(t.key()) {
                rows.push(t.clone());
                written += 1;
            }
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transitions::EntityKind;

    fn record(id: Uuid, seq: u32) -> StateTransition {
        StateTransition::new(EntityKind::Step, id, "running", "completed", seq)
    }

    #[tokio::test]
    async fn test_persist_and_query() {
        let store = InMemoryTransitionStore::new();
        let id = Uuid::new_v4();

        let written = store
            .persist_batch(&[record(id, 0), record(id, 1)])
            .await
            .unwrap();

        assert_eq!(written, 2);
        assert_eq!(store.for_entity(id).len(), 2);
    }

    #[tokio::test]
    async fn test_reflush_is_idempotent() {
        let store = InMemoryTransitionStore::new();
        let id = Uuid::new_v4();
        let batch = vec![record(id, 0)];

        assert_eq!(store.persist_batch(&batch).await.unwrap(), 1);
        assert_eq!(store.persist_batch(&batch).await.unwrap(), 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_sequences_are_distinct_rows() {
        let store = InMemoryTransitionStore::new();
        let id = Uuid::new_v4();

        store
            .persist_batch(&[record(id, 0), record(id, 0), record(id, 1)])
            .await
            .unwrap();

        assert_eq!(store.len(), 2);
    }
}
