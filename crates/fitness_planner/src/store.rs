//! [`Persister`] implementations: a JSON document on disk, an in-memory
//! store, and a retrying wrapper around either.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::retry::RetryPolicy;
use crate::{FitnessEvent, Persister, PlanMap, PlannerError, StoredDocument};

/// Persists the whole planner state as one pretty-printed JSON document.
///
/// Writes go to a sibling temp file first and are renamed into place.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_document(&self) -> Result<Option<StoredDocument>, PlannerError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_document(&self, doc: &StoredDocument) -> Result<(), PlannerError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_vec_pretty(doc)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl Persister for JsonFileStore {
    async fn save(
        &self,
        events: Option<&[FitnessEvent]>,
        plans: &PlanMap,
    ) -> Result<(), PlannerError> {
        let _guard = self.write_lock.lock().await;
        let events = match events {
            Some(events) => Some(events.to_vec()),
            None => self.read_document().await?.and_then(|doc| doc.events),
        };
        let doc = StoredDocument {
            events,
            plans: plans.clone(),
        };
        self.write_document(&doc).await?;
        tracing::debug!(path = %self.path.display(), plans = doc.plans.len(), "saved document");
        Ok(())
    }

    async fn load(&self) -> Result<Option<StoredDocument>, PlannerError> {
        self.read_document().await
    }
}

/// One recorded `save` call.
#[derive(Clone, Debug, PartialEq)]
pub struct SaveRecord {
    pub events: Option<Vec<FitnessEvent>>,
    pub plans: PlanMap,
}

/// Keeps the document in memory and records every save call.
#[derive(Debug, Default)]
pub struct MemoryStore {
    document: Mutex<Option<StoredDocument>>,
    saves: Mutex<Vec<SaveRecord>>,
    failures_left: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(doc: StoredDocument) -> Self {
        Self {
            document: Mutex::new(Some(doc)),
            ..Self::default()
        }
    }

    /// Make the next `n` saves fail with [`PlannerError::Persist`].
    pub fn fail_next(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub async fn saves(&self) -> Vec<SaveRecord> {
        self.saves.lock().await.clone()
    }

    pub async fn save_count(&self) -> usize {
        self.saves.lock().await.len()
    }

    pub async fn document(&self) -> Option<StoredDocument> {
        self.document.lock().await.clone()
    }
}

#[async_trait]
impl Persister for MemoryStore {
    async fn save(
        &self,
        events: Option<&[FitnessEvent]>,
        plans: &PlanMap,
    ) -> Result<(), PlannerError> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(PlannerError::Persist("injected failure".into()));
        }

        self.saves.lock().await.push(SaveRecord {
            events: events.map(<[FitnessEvent]>::to_vec),
            plans: plans.clone(),
        });
        let mut doc = self.document.lock().await;
        let stored = doc.get_or_insert_with(StoredDocument::default);
        if let Some(events) = events {
            stored.events = Some(events.to_vec());
        }
        stored.plans = plans.clone();
        Ok(())
    }

    async fn load(&self) -> Result<Option<StoredDocument>, PlannerError> {
        Ok(self.document.lock().await.clone())
    }
}

/// Retries failed saves and loads of the wrapped persister.
pub struct RetryingPersister {
    inner: Arc<dyn Persister>,
    policy: RetryPolicy,
}

impl RetryingPersister {
    pub fn new(inner: Arc<dyn Persister>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl Persister for RetryingPersister {
    async fn save(
        &self,
        events: Option<&[FitnessEvent]>,
        plans: &PlanMap,
    ) -> Result<(), PlannerError> {
        self.policy
            .run(|| self.inner.save(events, plans))
            .await
    }

    async fn load(&self) -> Result<Option<StoredDocument>, PlannerError> {
        self.policy.run(|| self.inner.load()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TrainingWeek;
    use std::time::Duration;

    fn plans_with(event_id: &str) -> PlanMap {
        let mut plans = PlanMap::new();
        plans.insert(event_id.to_string(), vec![TrainingWeek::new("week-1", 1)]);
        plans
    }

    #[tokio::test]
    async fn memory_store_keeps_events_when_none() {
        let store = MemoryStore::new();
        let events = vec![FitnessEvent::default_triathlon()];
        store.save(Some(&events), &PlanMap::new()).await.unwrap();
        store.save(None, &plans_with("triathlon-2026")).await.unwrap();

        let doc = store.document().await.unwrap();
        assert_eq!(doc.events, Some(events));
        assert_eq!(doc.plans.len(), 1);
        assert_eq!(store.save_count().await, 2);
        assert_eq!(store.saves().await[1].events, None);
    }

    #[tokio::test]
    async fn memory_store_injected_failures() {
        let store = MemoryStore::new();
        store.fail_next(1);
        assert!(store.save(None, &PlanMap::new()).await.is_err());
        assert!(store.save(None, &PlanMap::new()).await.is_ok());
        assert_eq!(store.save_count().await, 1);
    }

    #[tokio::test]
    async fn retrying_persister_recovers() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next(2);
        let retrying = RetryingPersister::new(
            store.clone(),
            RetryPolicy {
                max_retries: 2,
                base_delay: Duration::from_millis(1),
            },
        );
        retrying.save(None, &plans_with("a")).await.unwrap();
        assert_eq!(store.save_count().await, 1);
    }

    #[tokio::test]
    async fn retrying_persister_gives_up() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next(5);
        let retrying = RetryingPersister::new(
            store.clone(),
            RetryPolicy {
                max_retries: 1,
                base_delay: Duration::from_millis(1),
            },
        );
        let err = retrying.save(None, &plans_with("a")).await.unwrap_err();
        assert!(matches!(err, PlannerError::Persist(_)));
        assert_eq!(store.save_count().await, 0);
    }
}
