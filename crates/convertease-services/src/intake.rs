//! Upload intake: validates one incoming file and stages it for conversion.
//!
//! Checks run cheapest first: file count, declared size, declared type, then
//! the body is streamed into staging storage under the tier's byte limit and
//! its leading bytes are sniffed against the declared type. A rejected upload
//! never leaves a staged object behind.

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use convertease_core::models::{
    normalize_mime, ClientIdentity, FormatCategory, TierTable, UploadedFile,
};
use convertease_core::{AppError, FormatRegistry};
use convertease_processing::{check_declared_type, sanitize_filename, ValidationError, SNIFF_LEN};
use convertease_storage::{keys, ByteStream, Storage, StorageError};

use crate::map_storage_error;

/// One file part of an upload request, not yet read.
pub struct IncomingFile {
    pub declared_name: String,
    pub declared_type: String,
    /// Size announced by the client, when known before reading the body
    pub declared_size: Option<u64>,
    pub body: ByteStream,
}

impl IncomingFile {
    pub fn from_bytes(
        declared_name: impl Into<String>,
        declared_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        let data: Bytes = data.into();
        Self {
            declared_name: declared_name.into(),
            declared_type: declared_type.into(),
            declared_size: Some(data.len() as u64),
            body: Box::pin(futures::stream::once(async move {
                Ok::<_, std::io::Error>(data)
            })),
        }
    }
}

#[derive(Default)]
struct StagedUploads {
    uploads: HashMap<Uuid, UploadedFile>,
    claimed: HashSet<Uuid>,
}

pub struct UploadIntake {
    storage: Arc<dyn Storage>,
    registry: Arc<FormatRegistry>,
    tiers: TierTable,
    staged: RwLock<StagedUploads>,
}

impl UploadIntake {
    pub fn new(storage: Arc<dyn Storage>, registry: Arc<FormatRegistry>, tiers: TierTable) -> Self {
        Self {
            storage,
            registry,
            tiers,
            staged: RwLock::new(StagedUploads::default()),
        }
    }

    /// Validate and stage the single file of an upload request.
    #[tracing::instrument(skip(self, files), fields(client_id = %client.client_id, tier = %client.tier, file_count = files.len()))]
    pub async fn stage(
        &self,
        client: &ClientIdentity,
        mut files: Vec<IncomingFile>,
    ) -> Result<UploadedFile, AppError> {
        if files.len() > 1 {
            return Err(AppError::TooManyFiles { count: files.len() });
        }
        let file = files
            .pop()
            .ok_or_else(|| AppError::InvalidInput("No file provided".to_string()))?;

        let filename = sanitize_filename(&file.declared_name)
            .map_err(|e| AppError::InvalidInput(e.to_string()))?;

        let limit = self.tiers.get(client.tier).max_upload_bytes;
        if let Some(size) = file.declared_size {
            if size > limit {
                tracing::info!(size, limit, "Rejecting upload by declared size");
                return Err(AppError::FileTooLarge {
                    size,
                    limit,
                    tier: client.tier.to_string(),
                });
            }
        }

        let content_type = normalize_mime(&file.declared_type);
        if !self.registry.accepts_source(&content_type) {
            return Err(AppError::UnsupportedType(format!(
                "No conversion accepts {}",
                if content_type.is_empty() {
                    "an untyped file"
                } else {
                    content_type.as_str()
                }
            )));
        }

        let id = Uuid::new_v4();
        let storage_key = keys::upload_key(&client.client_id, id);

        let size_bytes = match self
            .storage
            .put_stream(&storage_key, file.body, Some(limit))
            .await
        {
            Ok(written) => written,
            Err(StorageError::LimitExceeded { limit }) => {
                tracing::info!(limit, "Upload body exceeded tier limit");
                return Err(AppError::FileTooLarge {
                    size: file
                        .declared_size
                        .filter(|size| *size > limit)
                        .unwrap_or(limit.saturating_add(1)),
                    limit,
                    tier: client.tier.to_string(),
                });
            }
            Err(e) => return Err(map_storage_error(e)),
        };

        let category = match self.sniff_staged(&storage_key, &content_type).await {
            Ok(category) => category,
            Err(e) => {
                self.delete_staged(&storage_key).await;
                return Err(e);
            }
        };

        let upload = UploadedFile {
            id,
            client_id: client.client_id.clone(),
            tier: client.tier,
            filename,
            content_type,
            category,
            size_bytes,
            storage_key,
            created_at: Utc::now(),
        };

        self.staged.write().await.uploads.insert(id, upload.clone());

        tracing::info!(
            upload_id = %upload.id,
            filename = %upload.filename,
            content_type = %upload.content_type,
            size_bytes,
            "Upload staged"
        );

        Ok(upload)
    }

    async fn sniff_staged(
        &self,
        storage_key: &str,
        content_type: &str,
    ) -> Result<FormatCategory, AppError> {
        let mut stream = self
            .storage
            .get_stream(storage_key)
            .await
            .map_err(map_storage_error)?;

        let mut head = BytesMut::with_capacity(SNIFF_LEN);
        while head.len() < SNIFF_LEN {
            match stream.next().await {
                Some(chunk) => {
                    let chunk = chunk.map_err(map_storage_error)?;
                    let take = chunk.len().min(SNIFF_LEN - head.len());
                    head.extend_from_slice(&chunk[..take]);
                }
                None => break,
            }
        }

        check_declared_type(content_type, &head).map_err(|e| match e {
            ValidationError::EmptyFile => AppError::InvalidInput("Empty file".to_string()),
            other => AppError::UnsupportedType(other.to_string()),
        })
    }

    async fn delete_staged(&self, storage_key: &str) {
        if let Err(e) = self.storage.delete(storage_key).await {
            tracing::warn!(error = %e, storage_key, "Failed to delete rejected upload");
        }
    }

    /// Staged upload owned by `client_id`; other clients' uploads are `NotFound`.
    pub async fn get(&self, client_id: &str, upload_id: Uuid) -> Result<UploadedFile, AppError> {
        self.find(upload_id)
            .await
            .filter(|upload| upload.client_id == client_id)
            .ok_or_else(|| AppError::NotFound(format!("Upload {} not found", upload_id)))
    }

    pub async fn find(&self, upload_id: Uuid) -> Option<UploadedFile> {
        self.staged.read().await.uploads.get(&upload_id).cloned()
    }

    /// Staged bytes of an upload.
    pub async fn read(&self, upload: &UploadedFile) -> Result<Bytes, AppError> {
        self.storage
            .get(&upload.storage_key)
            .await
            .map_err(map_storage_error)
    }

    /// Mark an upload as referenced by a job so the stale-upload sweep leaves it alone.
    /// A job that already finished and discarded its upload leaves nothing to claim.
    pub async fn claim(&self, upload_id: Uuid) {
        let mut staged = self.staged.write().await;
        if staged.uploads.contains_key(&upload_id) {
            staged.claimed.insert(upload_id);
        }
    }

    /// Delete the staged bytes of an upload. Unknown ids are a no-op.
    pub async fn discard(&self, upload_id: Uuid) {
        let removed = {
            let mut staged = self.staged.write().await;
            staged.claimed.remove(&upload_id);
            staged.uploads.remove(&upload_id)
        };

        if let Some(upload) = removed {
            self.delete_staged(&upload.storage_key).await;
            tracing::debug!(upload_id = %upload_id, "Staged upload discarded");
        }
    }

    /// Discard uploads that never got a job within their tier's retention window.
    pub async fn sweep_unclaimed(&self, now: DateTime<Utc>) -> usize {
        let stale: Vec<Uuid> = {
            let staged = self.staged.read().await;
            staged
                .uploads
                .values()
                .filter(|upload| !staged.claimed.contains(&upload.id))
                .filter(|upload| upload.created_at + self.tiers.get(upload.tier).retention() <= now)
                .map(|upload| upload.id)
                .collect()
        };

        for upload_id in &stale {
            self.discard(*upload_id).await;
        }
        stale.len()
    }
}
