//! In-memory storage backend.
//!
//! Used for development and tests, and in single-node deployments where
//! staged files never need to survive a restart.

use crate::traits::{validate_key, ByteStream, Storage, StorageError, StorageResult, StorageStream};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryStorage {
    objects: RwLock<HashMap<String, Bytes>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn put(&self, storage_key: &str, data: Bytes, _content_type: &str) -> StorageResult<()> {
        validate_key(storage_key)?;
        self.objects
            .write()
            .await
            .insert(storage_key.to_string(), data);
        Ok(())
    }

    async fn put_stream(
        &self,
        storage_key: &str,
        mut body: ByteStream,
        max_bytes: Option<u64>,
    ) -> StorageResult<u64> {
        validate_key(storage_key)?;

        // Buffered locally so a rejected body never becomes visible.
        let mut buffer = BytesMut::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| {
                StorageError::UploadFailed(format!("Failed to read upload body: {}", e))
            })?;
            if let Some(limit) = max_bytes {
                if (buffer.len() + chunk.len()) as u64 > limit {
                    return Err(StorageError::LimitExceeded { limit });
                }
            }
            buffer.extend_from_slice(&chunk);
        }

        let written = buffer.len() as u64;
        self.objects
            .write()
            .await
            .insert(storage_key.to_string(), buffer.freeze());
        Ok(written)
    }

    async fn get(&self, storage_key: &str) -> StorageResult<Bytes> {
        validate_key(storage_key)?;
        self.objects
            .read()
            .await
            .get(storage_key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(storage_key.to_string()))
    }

    async fn get_stream(&self, storage_key: &str) -> StorageResult<StorageStream> {
        let data = self.get(storage_key).await?;
        Ok(Box::pin(futures::stream::once(async move {
            Ok::<_, StorageError>(data)
        })))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        validate_key(storage_key)?;
        self.objects.write().await.remove(storage_key);
        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        validate_key(storage_key)?;
        Ok(self.objects.read().await.contains_key(storage_key))
    }

    async fn content_length(&self, storage_key: &str) -> StorageResult<u64> {
        Ok(self.get(storage_key).await?.len() as u64)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[tokio::test]
    async fn test_put_get_delete() {
        let storage = InMemoryStorage::new();
        storage
            .put("results/a/1", Bytes::from_static(b"abc"), "text/plain")
            .await
            .unwrap();
        assert_eq!(&storage.get("results/a/1").await.unwrap()[..], b"abc");

        storage.delete("results/a/1").await.unwrap();
        assert!(matches!(
            storage.get("results/a/1").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_put_stream_limit() {
        let storage = InMemoryStorage::new();
        let body: ByteStream = Box::pin(stream::iter(vec![
            Ok::<_, std::io::Error>(Bytes::from_static(b"12345")),
            Ok(Bytes::from_static(b"67890")),
        ]));

        let result = storage.put_stream("uploads/a/1", body, Some(8)).await;

        assert!(matches!(result, Err(StorageError::LimitExceeded { limit: 8 })));
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_invalid_key() {
        let storage = InMemoryStorage::new();
        assert!(matches!(
            storage.exists("../x").await,
            Err(StorageError::InvalidKey(_))
        ));
    }
}
