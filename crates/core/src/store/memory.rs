//! In-process store backends, mainly for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use bytes::Bytes;

use super::{ObjectStore, PipelineTrigger, RecordStore, StoreError, WorkRecord};

/// An in-memory [`RecordStore`] with the same compare-and-swap
/// semantics as the persistent backends.
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    records: Arc<RwLock<HashMap<String, WorkRecord>>>,
}

impl MemoryRecordStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record stored for the given owner, if any.
    pub fn get(&self, owner_id: &str) -> Option<WorkRecord> {
        self.records.read().unwrap().get(owner_id).cloned()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn scan_ready(&self) -> Result<Vec<WorkRecord>, StoreError> {
        let records = self.records.read().unwrap();
        let mut ready: Vec<_> =
            records.values().filter(|r| r.ready).cloned().collect();
        // HashMap iteration order is arbitrary; keep scans stable.
        ready.sort_by(|a, b| a.owner_id.cmp(&b.owner_id));
        Ok(ready)
    }

    async fn put(
        &self,
        mut record: WorkRecord,
        expected_revision: Option<u64>,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write().unwrap();
        let current = records.get(&record.owner_id).map(|r| r.revision);
        if let Some(expected) = expected_revision {
            if current.unwrap_or(0) != expected {
                return Err(StoreError::RevisionConflict {
                    owner_id: record.owner_id,
                    expected,
                });
            }
        }
        record.revision = current.unwrap_or(0) + 1;
        records.insert(record.owner_id.clone(), record);
        Ok(())
    }
}

/// An in-memory [`ObjectStore`].
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl MemoryObjectStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every stored key, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> =
            self.objects.read().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, bytes: Bytes) -> Result<(), StoreError> {
        self.objects
            .write()
            .unwrap()
            .insert(key.to_owned(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        self.objects
            .read()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_owned()))
    }
}

/// A [`PipelineTrigger`] that records every start request.
#[derive(Clone, Default)]
pub struct RecordingTrigger {
    started: Arc<Mutex<Vec<String>>>,
}

impl RecordingTrigger {
    /// Creates a trigger with an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the pipelines started so far, in order.
    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }
}

#[async_trait]
impl PipelineTrigger for RecordingTrigger {
    async fn start(&self, pipeline: &str) {
        self.started.lock().unwrap().push(pipeline.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scan_ready_filters_and_sorts() {
        let store = MemoryRecordStore::new();
        store
            .put(WorkRecord::new("bob", vec!["Lathe".into()]), None)
            .await
            .unwrap();
        let mut done = WorkRecord::new("alice", vec![]);
        done.ready = false;
        store.put(done, None).await.unwrap();

        let ready = store.scan_ready().await.unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].owner_id, "bob");
        assert_eq!(ready[0].revision, 1);
    }

    #[tokio::test]
    async fn test_revision_cas() {
        let store = MemoryRecordStore::new();
        let record = WorkRecord::new("alice", vec!["Press".into()]);
        store.put(record.clone(), None).await.unwrap();

        // A writer holding the current revision wins.
        let mut current = store.get("alice").unwrap();
        current.ready = false;
        store.put(current, Some(1)).await.unwrap();
        assert_eq!(store.get("alice").unwrap().revision, 2);

        // A stale writer loses.
        let err = store.put(record, Some(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::RevisionConflict { .. }));
    }

    #[tokio::test]
    async fn test_cas_against_missing_record() {
        let store = MemoryRecordStore::new();
        let err = store
            .put(WorkRecord::new("ghost", vec![]), Some(3))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::RevisionConflict { .. }));
    }

    #[tokio::test]
    async fn test_object_store_roundtrip() {
        let store = MemoryObjectStore::new();
        store
            .put("alice/lathe/main.py", Bytes::from_static(b"print(1)"))
            .await
            .unwrap();
        let bytes = store.get("alice/lathe/main.py").await.unwrap();
        assert_eq!(&bytes[..], b"print(1)");
        assert!(matches!(
            store.get("alice/missing").await,
            Err(StoreError::NotFound(_))
        ));
    }
}
