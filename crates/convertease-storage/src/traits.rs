//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Object exceeds {limit} bytes")]
    LimitExceeded { limit: u64 },

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Chunked body fed into [`Storage::put_stream`].
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Chunked body returned by [`Storage::get_stream`].
pub type StorageStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Storage abstraction trait
///
/// Staged uploads and converted results both go through this trait, so the
/// intake, the result store and the converters never know which backend is in use.
/// Keys are built by the `keys` module and must not contain `..` or a leading `/`.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `data` under `storage_key`, replacing any previous object
    async fn put(&self, storage_key: &str, data: Bytes, content_type: &str) -> StorageResult<()>;

    /// Store a chunked body under `storage_key` and return the number of bytes written.
    ///
    /// When `max_bytes` is set and the body grows past it, writing stops, the
    /// partial object is removed and `LimitExceeded` is returned.
    async fn put_stream(
        &self,
        storage_key: &str,
        body: ByteStream,
        max_bytes: Option<u64>,
    ) -> StorageResult<u64>;

    /// Read a whole object
    async fn get(&self, storage_key: &str) -> StorageResult<Bytes>;

    /// Read an object as a stream of chunks
    async fn get_stream(&self, storage_key: &str) -> StorageResult<StorageStream>;

    /// Delete an object; deleting a missing key succeeds
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Check if an object exists
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Get the size in bytes of an object, if it exists.
    async fn content_length(&self, storage_key: &str) -> StorageResult<u64>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}

pub(crate) fn validate_key(storage_key: &str) -> StorageResult<()> {
    if storage_key.is_empty() || storage_key.contains("..") || storage_key.starts_with('/') {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}
