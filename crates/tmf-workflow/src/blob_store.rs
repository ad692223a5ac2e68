//! Blob Storage
//!
//! Content-addressed storage for revision payloads: the blob id is the
//! lowercase sha-256 hex digest of the content, so `put` is idempotent and
//! identical payloads dedupe. Implementations target the local filesystem
//! or memory; the engine only sees the trait.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tmf_types::BlobId;

/// Error type for blob storage operations
#[derive(Debug, thiserror::Error)]
pub enum BlobStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Digest content into its blob id
pub fn content_digest(content: &[u8]) -> BlobId {
    BlobId::new(hex::encode(Sha256::digest(content)))
}

/// Abstract blob storage for revision payloads
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store content, returning its content-digest id. Idempotent.
    async fn put(&self, content: &[u8]) -> Result<BlobId, BlobStoreError>;

    /// Fetch content by id
    async fn get(&self, blob_id: &BlobId) -> Result<Vec<u8>, BlobStoreError>;

    /// Delete content by id. Deleting an absent blob is not an error.
    async fn delete(&self, blob_id: &BlobId) -> Result<(), BlobStoreError>;

    /// Check if a blob exists
    async fn exists(&self, blob_id: &BlobId) -> Result<bool, BlobStoreError>;
}

/// Local filesystem implementation
pub struct FsBlobStore {
    base_path: PathBuf,
}

impl FsBlobStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Fan out by the first two digest characters to keep directories small
    fn path_for(&self, blob_id: &BlobId) -> PathBuf {
        let id = blob_id.as_str();
        let shard = if id.len() >= 2 { &id[..2] } else { "00" };
        self.base_path.join(shard).join(id)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, content: &[u8]) -> Result<BlobId, BlobStoreError> {
        let blob_id = content_digest(content);
        let path = self.path_for(&blob_id);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;
        Ok(blob_id)
    }

    async fn get(&self, blob_id: &BlobId) -> Result<Vec<u8>, BlobStoreError> {
        let path = self.path_for(blob_id);
        if !path.exists() {
            return Err(BlobStoreError::NotFound(blob_id.to_string()));
        }
        Ok(tokio::fs::read(path).await?)
    }

    async fn delete(&self, blob_id: &BlobId) -> Result<(), BlobStoreError> {
        let path = self.path_for(blob_id);
        if path.exists() {
            tokio::fs::remove_file(path).await?;
        }
        Ok(())
    }

    async fn exists(&self, blob_id: &BlobId) -> Result<bool, BlobStoreError> {
        Ok(self.path_for(blob_id).exists())
    }
}

/// In-memory blob store
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: Arc<tokio::sync::RwLock<HashMap<BlobId, Vec<u8>>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, content: &[u8]) -> Result<BlobId, BlobStoreError> {
        let blob_id = content_digest(content);
        let mut blobs = self.blobs.write().await;
        blobs.insert(blob_id.clone(), content.to_vec());
        Ok(blob_id)
    }

    async fn get(&self, blob_id: &BlobId) -> Result<Vec<u8>, BlobStoreError> {
        let blobs = self.blobs.read().await;
        blobs
            .get(blob_id)
            .cloned()
            .ok_or_else(|| BlobStoreError::NotFound(blob_id.to_string()))
    }

    async fn delete(&self, blob_id: &BlobId) -> Result<(), BlobStoreError> {
        let mut blobs = self.blobs.write().await;
        blobs.remove(blob_id);
        Ok(())
    }

    async fn exists(&self, blob_id: &BlobId) -> Result<bool, BlobStoreError> {
        let blobs = self.blobs.read().await;
        Ok(blobs.contains_key(blob_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_fs_blob_store_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp_dir.path());

        let content = b"protocol draft v1";
        let blob_id = store.put(content).await.unwrap();
        assert_eq!(blob_id, content_digest(content));

        assert!(store.exists(&blob_id).await.unwrap());
        let fetched = store.get(&blob_id).await.unwrap();
        assert_eq!(fetched, content);

        store.delete(&blob_id).await.unwrap();
        assert!(!store.exists(&blob_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_put_is_idempotent() {
        let store = InMemoryBlobStore::new();
        let a = store.put(b"same bytes").await.unwrap();
        let b = store.put(b"same bytes").await.unwrap();
        assert_eq!(a, b);

        let c = store.put(b"other bytes").await.unwrap();
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_in_memory_roundtrip() {
        let store = InMemoryBlobStore::new();
        let blob_id = store.put(b"payload").await.unwrap();
        assert_eq!(store.get(&blob_id).await.unwrap(), b"payload");

        store.delete(&blob_id).await.unwrap();
        assert!(!store.exists(&blob_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_blob_is_not_found() {
        let store = InMemoryBlobStore::new();
        let result = store.get(&BlobId::new("deadbeef")).await;
        assert!(matches!(result, Err(BlobStoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_absent_blob_is_ok() {
        let store = InMemoryBlobStore::new();
        assert!(store.delete(&BlobId::new("deadbeef")).await.is_ok());
    }
}
