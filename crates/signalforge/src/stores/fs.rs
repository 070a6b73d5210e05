//! An object store backed by a local directory tree.

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use signalforge_core::store::{ObjectStore, StoreError};
use tokio::fs;

/// Stores objects as files under a root directory, one file per key.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Creates a store rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, bytes: Bytes) -> Result<(), StoreError> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| StoreError::Backend(err.to_string()))?;
        }
        fs::write(&path, &bytes)
            .await
            .map_err(|err| StoreError::Backend(err.to_string()))
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        match fs::read(self.root.join(key)).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_owned()))
            }
            Err(err) => Err(StoreError::Backend(err.to_string())),
        }
    }
}
