//! Object storage for uploaded blobs
//!
//! Handlers only see [`ObjectStore`]. The hosted bucket API, a local directory
//! and an in-memory map implement it.

pub mod local;
pub mod memory;
pub mod rest_client;

pub use local::LocalStore;
pub use memory::MemoryStore;
pub use rest_client::{RestStore, RestStoreConfig};

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{StorageBackend, StorageConfig};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage permission denied: {0}")]
    PermissionDenied(String),

    #[error("Object too large: {0}")]
    TooLarge(String),

    #[error("Storage error: {0}")]
    Other(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store bytes under a key
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()>;

    /// Fetch bytes by key, `NotFound` when the object is gone
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Delete by key; deleting a missing object succeeds
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Publicly reachable URL of the key, if the backend serves one
    fn public_url(&self, key: &str) -> Option<String>;

    async fn health_check(&self) -> StorageResult<()>;

    fn backend_name(&self) -> &'static str;
}

/// Build the configured store
pub fn build_object_store(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match config.backend {
        StorageBackend::Rest => Arc::new(RestStore::new(RestStoreConfig {
            url: config.url.clone(),
            bucket: config.bucket.clone(),
            service_key: config.service_key.clone(),
            timeout_seconds: config.timeout_seconds,
        })?),
        StorageBackend::Local => Arc::new(LocalStore::new(config.local_dir.clone())),
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
    };

    tracing::info!(backend = store.backend_name(), "Object store initialized");
    Ok(store)
}

/// Keys are relative, `/`-separated and never climb out of their root
pub(crate) fn validate_key(key: &str) -> StorageResult<()> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");

    if bad {
        return Err(StorageError::Other(format!("Invalid object key: {}", key)));
    }
    Ok(())
}
