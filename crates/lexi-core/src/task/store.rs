use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, RwLock};
use tracing::debug;

use super::{TaskId, TaskRecord, TaskResult};
use crate::error::StoreError;

/// Polling period of the default [`TaskStore::wait`].
const WAIT_POLL: Duration = Duration::from_millis(50);

/// Keyed storage of [`TaskRecord`]s.
///
/// Implementations must make `finish` a single-writer transition: only a
/// record that is still `processing` may move to a terminal state, so a task
/// is written terminally at most once even if two parties race to finish it.
#[async_trait]
pub trait TaskStore: Send + Sync + 'static {
    /// Create a `processing` record for `id`.
    async fn register(&self, id: &str) -> Result<TaskRecord, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<TaskRecord>, StoreError>;

    /// Move `id` to the terminal state implied by `result`.
    ///
    /// Returns `false` if the record is unknown or already terminal.
    async fn finish(&self, id: &str, result: TaskResult) -> Result<bool, StoreError>;

    /// Wait until `id` is terminal. Returns `None` for unknown ids.
    async fn wait(&self, id: &str) -> Result<Option<TaskRecord>, StoreError> {
        loop {
            match self.get(id).await? {
                Some(record) if !record.status().is_terminal() => tokio::time::sleep(WAIT_POLL).await,
                other => return Ok(other),
            }
        }
    }
}

#[derive(Default)]
struct MemoryInner {
    records: HashMap<TaskId, TaskRecord>,
    /// Terminal ids, oldest first; eviction candidates.
    finished: VecDeque<TaskId>,
}

/// Process-local task store.
///
/// Bounded by `max_records` (`0` = unbounded): once exceeded, the oldest
/// terminal records are evicted. Records still `processing` are never
/// evicted, so the store may temporarily hold more than the bound.
pub struct MemoryTaskStore {
    inner: RwLock<MemoryInner>,
    changed: Notify,
    max_records: usize,
}

impl MemoryTaskStore {
    pub fn new(max_records: usize) -> Self {
        Self { inner: RwLock::new(MemoryInner::default()), changed: Notify::new(), max_records }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryTaskStore {
    fn default() -> Self {
        Self::new(0)
    }
}

impl std::fmt::Debug for MemoryTaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MemoryTaskStore(max {})", self.max_records)
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn register(&self, id: &str) -> Result<TaskRecord, StoreError> {
        let record = TaskRecord::processing(id);
        self.inner.write().await.records.insert(id.to_owned(), record.clone());
        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<Option<TaskRecord>, StoreError> {
        Ok(self.inner.read().await.records.get(id).cloned())
    }

    async fn finish(&self, id: &str, result: TaskResult) -> Result<bool, StoreError> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        let finished = match inner.records.get_mut(id) {
            Some(record) => record.finish(result),
            None => false,
        };
        if finished {
            inner.finished.push_back(id.to_owned());
            while self.max_records > 0 && inner.records.len() > self.max_records {
                let Some(oldest) = inner.finished.pop_front() else { break };
                inner.records.remove(&oldest);
                debug!(task_id = %oldest, "evicted finished task record");
            }
        }
        drop(guard);
        if finished {
            self.changed.notify_waiters();
        }
        Ok(finished)
    }

    async fn wait(&self, id: &str) -> Result<Option<TaskRecord>, StoreError> {
        loop {
            // Register interest before reading so a finish in between is not missed.
            let notified = self.changed.notified();
            match self.get(id).await? {
                Some(record) if !record.status().is_terminal() => notified.await,
                other => return Ok(other),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use super::*;
    use crate::task::TaskStatus;

    fn done() -> TaskResult {
        TaskResult::Translations(BTreeMap::new())
    }

    #[tokio::test]
    async fn unknown_id_is_none() {
        let store = MemoryTaskStore::default();
        assert!(store.get("nope").await.unwrap().is_none());
        assert!(!store.finish("nope", done()).await.unwrap());
        assert!(store.wait("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn second_finish_is_rejected() {
        let store = MemoryTaskStore::default();
        store.register("t1").await.unwrap();
        assert!(store.finish("t1", TaskResult::Error("first".into())).await.unwrap());
        assert!(!store.finish("t1", done()).await.unwrap());

        let record = store.get("t1").await.unwrap().unwrap();
        assert_eq!(record.status(), TaskStatus::Failed);
        assert_eq!(record.result(), Some(&TaskResult::Error("first".into())));
    }

    #[tokio::test]
    async fn wait_wakes_on_finish() {
        let store = Arc::new(MemoryTaskStore::default());
        store.register("t1").await.unwrap();

        let waiter = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.wait("t1").await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        store.finish("t1", done()).await.unwrap();

        let record = waiter.await.unwrap().unwrap().unwrap();
        assert_eq!(record.status(), TaskStatus::Completed);
    }

    #[tokio::test]
    async fn eviction_spares_processing_records() {
        let store = MemoryTaskStore::new(2);
        store.register("old").await.unwrap();
        store.register("running").await.unwrap();
        store.register("new").await.unwrap();

        store.finish("old", done()).await.unwrap();
        assert!(store.get("old").await.unwrap().is_none(), "oldest finished record is evicted");
        assert!(store.get("running").await.unwrap().is_some());

        store.finish("new", done()).await.unwrap();
        assert_eq!(store.len().await, 2);
        assert!(store.get("new").await.unwrap().is_some());
        assert_eq!(store.get("running").await.unwrap().unwrap().status(), TaskStatus::Processing);
    }
}
