//! Local-directory object store used in development and tests.

use super::{Blob, ObjectStore, ObjectStoreError, validate_key};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Stores each blob as a file named after its key under a root directory.
pub struct FilesystemObjectStore {
    root: PathBuf,
}

impl FilesystemObjectStore {
    /// Create a store rooted at `root`. The directory is created lazily on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn full_path(&self, key: &str) -> Result<PathBuf, ObjectStoreError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

async fn write_and_swap(temp_path: &Path, full_path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(temp_path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(temp_path, full_path).await
}

#[async_trait]
impl ObjectStore for FilesystemObjectStore {
    async fn put(&self, key: &str, bytes: &[u8], _content_type: &str) -> Result<(), ObjectStoreError> {
        let full_path = self.full_path(key)?;
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // temp file + rename so readers never observe a partial blob
        let temp_path = full_path.with_file_name(format!(
            ".{}.tmp",
            full_path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or(key)
        ));
        if let Err(err) = write_and_swap(&temp_path, &full_path, bytes).await {
            tracing::warn!(
                temp = %temp_path.display(),
                dest = %full_path.display(),
                error = %err,
                "Blob write failed"
            );
            let _ = fs::remove_file(&temp_path).await;
            return Err(err.into());
        }

        tracing::debug!(storage_key = key, size = bytes.len(), "Blob written");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Blob, ObjectStoreError> {
        let full_path = self.full_path(key)?;
        match fs::read(&full_path).await {
            Ok(bytes) => Ok(Blob {
                bytes,
                content_type: None,
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(ObjectStoreError::NotFound(key.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let full_path = self.full_path(key)?;
        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
