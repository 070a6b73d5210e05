//! A work record store backed by a single JSON file.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use signalforge_core::store::{RecordStore, StoreError, WorkRecord};
use tokio::fs;

/// Holds every work record, keyed by owner, in one JSON file.
///
/// The whole file is rewritten on every put. Revisions follow the same
/// compare-and-swap rules as the in-memory backend, so a batch holding
/// a stale record cannot clobber a newer one.
pub struct JsonRecordStore {
    path: PathBuf,
    records: Mutex<HashMap<String, WorkRecord>>,
}

impl JsonRecordStore {
    /// Opens the store, loading the file if it exists.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let records = match fs::read(&path).await {
            Ok(data) => serde_json::from_slice(&data)
                .map_err(|err| StoreError::Backend(err.to_string()))?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                HashMap::new()
            }
            Err(err) => return Err(StoreError::Backend(err.to_string())),
        };
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }
}

#[async_trait]
impl RecordStore for JsonRecordStore {
    async fn scan_ready(&self) -> Result<Vec<WorkRecord>, StoreError> {
        let mut ready: Vec<_> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|record| record.ready)
            .cloned()
            .collect();
        ready.sort_by(|a, b| a.owner_id.cmp(&b.owner_id));
        Ok(ready)
    }

    async fn put(
        &self,
        mut record: WorkRecord,
        expected_revision: Option<u64>,
    ) -> Result<(), StoreError> {
        let snapshot = {
            let mut records = self.records.lock().unwrap();
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
            serde_json::to_vec_pretty(&*records)
                .map_err(|err| StoreError::Backend(err.to_string()))?
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|err| StoreError::Backend(err.to_string()))?;
            }
        }
        fs::write(&self.path, snapshot)
            .await
            .map_err(|err| StoreError::Backend(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            JsonRecordStore::open(dir.path().join("records.json")).await.unwrap();
        assert!(store.scan_ready().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");

        let store = JsonRecordStore::open(&path).await.unwrap();
        let record = WorkRecord::new("alice", vec!["Press".into()]);
        store.put(record, None).await.unwrap();

        let reopened = JsonRecordStore::open(&path).await.unwrap();
        let ready = reopened.scan_ready().await.unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].owner_id, "alice");
        assert_eq!(ready[0].revision, 1);
    }

    #[tokio::test]
    async fn test_stale_revision_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonRecordStore::open(dir.path().join("records.json"))
            .await
            .unwrap();
        let record = WorkRecord::new("alice", vec!["Press".into()]);
        store.put(record.clone(), None).await.unwrap();

        let mut fresh = record.clone();
        fresh.ready = false;
        store.put(fresh, Some(1)).await.unwrap();

        let err = store.put(record, Some(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::RevisionConflict { .. }));
    }
}
