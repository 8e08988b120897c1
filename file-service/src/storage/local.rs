//! Filesystem store rooted at `STORAGE_LOCAL_DIR`

use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, info};

use super::{validate_key, ObjectStore, StorageError, StorageResult};

pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: PathBuf) -> Self {
        info!("Using local object store at {}", root.display());
        Self { root }
    }

    fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |path, segment| path.join(segment)))
    }
}

fn map_io(err: std::io::Error, key: &str) -> StorageError {
    match err.kind() {
        ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
        ErrorKind::PermissionDenied => StorageError::PermissionDenied(err.to_string()),
        _ => StorageError::Other(err.to_string()),
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| map_io(e, key))?;
        }

        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| map_io(e, key))?;

        debug!("Wrote {} bytes to {}", data.len(), path.display());
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let path = self.path_for(key)?;
        let data = tokio::fs::read(&path).await.map_err(|e| map_io(e, key))?;
        Ok(Bytes::from(data))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(map_io(e, key)),
        }
    }

    fn public_url(&self, _key: &str) -> Option<String> {
        None
    }

    async fn health_check(&self) -> StorageResult<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| map_io(e, "<root>"))?;

        let metadata = tokio::fs::metadata(&self.root)
            .await
            .map_err(|e| map_io(e, "<root>"))?;

        if metadata.permissions().readonly() {
            return Err(StorageError::PermissionDenied(format!(
                "{} is read-only",
                self.root.display()
            )));
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}
