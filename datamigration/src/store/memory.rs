use super::StatusStore;
use crate::core::AggregateStatus;
use crate::errors::StoreError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Inner {
    current: HashMap<Uuid, AggregateStatus>,
    history: HashMap<Uuid, Vec<AggregateStatus>>,
}

/// In-memory status store. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStatusStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryStatusStore {
    /// Creates a new in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of runs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().current.len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().current.is_empty()
    }
}

#[async_trait]
impl StatusStore for InMemoryStatusStore {
    async fn get(&self, run_id: Uuid) -> Result<Option<AggregateStatus>, StoreError> {
        Ok(self.inner.lock().current.get(&run_id).cloned())
    }

    async fn put(&self, run_id: Uuid, status: AggregateStatus) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner
            .history
            .entry(run_id)
            .or_default()
            .push(status.clone());
        inner.current.insert(run_id, status);
        Ok(())
    }

    async fn history(&self, run_id: Uuid) -> Result<Vec<AggregateStatus>, StoreError> {
        Ok(self
            .inner
            .lock()
            .history
            .get(&run_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn run_ids(&self) -> Result<Vec<Uuid>, StoreError> {
        let mut ids: Vec<Uuid> = self.inner.lock().current.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{StepName, StepStatus};

    #[tokio::test]
    async fn test_get_missing_run() {
        let store = InMemoryStatusStore::new();
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = InMemoryStatusStore::new();
        let run_id = Uuid::new_v4();
        let aggregate = AggregateStatus::new(run_id).with_steps(vec![StepName::new("A")]);

        store.put(run_id, aggregate.clone()).await.unwrap();

        assert_eq!(store.get(run_id).await.unwrap(), Some(aggregate));
        assert_eq!(store.len(), 1);
        assert_eq!(store.run_ids().await.unwrap(), vec![run_id]);
    }

    #[tokio::test]
    async fn test_history_is_append_only() {
        let store = InMemoryStatusStore::new();
        let run_id = Uuid::new_v4();
        let mut aggregate = AggregateStatus::new(run_id).with_steps(vec![StepName::new("A")]);
        store.put(run_id, aggregate.clone()).await.unwrap();

        aggregate.step_mut(&StepName::new("A")).begin(chrono::Utc::now());
        store.put(run_id, aggregate).await.unwrap();

        let history = store.history(run_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].status_of("A"), StepStatus::Pending);
        assert_eq!(history[1].status_of("A"), StepStatus::InProgress);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = InMemoryStatusStore::new();
        let clone = store.clone();
        let run_id = Uuid::new_v4();

        clone.put(run_id, AggregateStatus::new(run_id)).await.unwrap();
        assert!(store.get(run_id).await.unwrap().is_some());
        assert_eq!(store.backend_type(), "memory");
    }
}
