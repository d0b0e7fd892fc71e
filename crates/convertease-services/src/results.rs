//! Converted artifacts and their expiry.
//!
//! A result is readable until `expires_at`; from then on `get` answers
//! `Expired` even if the sweep has not deleted the bytes yet. The sweep keeps
//! the metadata as a tombstone so later downloads still answer `Expired`
//! until the job itself is purged.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use convertease_core::models::{ConversionJob, ConversionResult};
use convertease_core::AppError;
use convertease_processing::ConvertedOutput;
use convertease_storage::{keys, Storage};

use crate::map_storage_error;

/// Download name for a converted artifact: source stem plus the target extension.
pub fn download_filename(source_filename: &str, extension: &str) -> String {
    let stem = match source_filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => source_filename,
    };
    format!("{}.{}", stem, extension)
}

pub struct ResultStore {
    storage: Arc<dyn Storage>,
    results: RwLock<HashMap<Uuid, ConversionResult>>,
    /// Swept results whose bytes are gone
    tombstones: RwLock<HashMap<Uuid, ConversionResult>>,
}

impl ResultStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            results: RwLock::new(HashMap::new()),
            tombstones: RwLock::new(HashMap::new()),
        }
    }

    fn expired_error(result: &ConversionResult) -> AppError {
        AppError::Expired(format!(
            "Result for job {} expired at {}",
            result.job_id, result.expires_at
        ))
    }

    /// Store the output of `job`, readable for `retention`.
    #[tracing::instrument(skip(self, job, output), fields(job_id = %job.id, size_bytes = output.data.len()))]
    pub async fn put(
        &self,
        job: &ConversionJob,
        output: ConvertedOutput,
        retention: chrono::Duration,
    ) -> Result<ConversionResult, AppError> {
        let storage_key = keys::result_key(&job.client_id, job.id);
        let size_bytes = output.data.len() as u64;

        self.storage
            .put(&storage_key, output.data, &output.content_type)
            .await
            .map_err(map_storage_error)?;

        let created_at = Utc::now();
        let result = ConversionResult {
            job_id: job.id,
            client_id: job.client_id.clone(),
            storage_key,
            content_type: output.content_type,
            filename: download_filename(&job.source_filename, &output.extension),
            size_bytes,
            created_at,
            expires_at: created_at + retention,
        };

        self.results.write().await.insert(job.id, result.clone());
        tracing::debug!(expires_at = %result.expires_at, "Result stored");

        Ok(result)
    }

    /// Metadata of a result, stored or swept.
    pub async fn metadata(&self, job_id: Uuid) -> Option<ConversionResult> {
        if let Some(result) = self.results.read().await.get(&job_id) {
            return Some(result.clone());
        }
        self.tombstones.read().await.get(&job_id).cloned()
    }

    pub async fn get(&self, job_id: Uuid) -> Result<(ConversionResult, Bytes), AppError> {
        let stored = self.results.read().await.get(&job_id).cloned();
        let result = match stored {
            Some(result) => result,
            None => {
                return Err(match self.tombstones.read().await.get(&job_id) {
                    Some(swept) => Self::expired_error(swept),
                    None => AppError::NotFound(format!("No result for job {}", job_id)),
                });
            }
        };

        if result.is_expired(Utc::now()) {
            return Err(Self::expired_error(&result));
        }

        let data = self
            .storage
            .get(&result.storage_key)
            .await
            .map_err(map_storage_error)?;

        Ok((result, data))
    }

    /// Delete a result on client request.
    pub async fn delete(&self, job_id: Uuid) -> Result<(), AppError> {
        let removed = self.results.write().await.remove(&job_id);
        let result = match removed {
            Some(result) => result,
            None => {
                return Err(match self.tombstones.read().await.get(&job_id) {
                    Some(swept) => Self::expired_error(swept),
                    None => AppError::NotFound(format!("No result for job {}", job_id)),
                });
            }
        };

        self.storage
            .delete(&result.storage_key)
            .await
            .map_err(map_storage_error)?;

        tracing::info!(job_id = %job_id, "Result deleted");
        Ok(())
    }

    /// Delete the bytes of every result expired at `now`, keeping a tombstone.
    /// Returns how many were removed.
    #[tracing::instrument(skip(self), fields(cleanup.operation = "expire_results"))]
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let expired: Vec<ConversionResult> = {
            let mut results = self.results.write().await;
            let ids: Vec<Uuid> = results
                .values()
                .filter(|r| r.is_expired(now))
                .map(|r| r.job_id)
                .collect();
            let expired: Vec<ConversionResult> =
                ids.iter().filter_map(|id| results.remove(id)).collect();
            let mut tombstones = self.tombstones.write().await;
            tombstones.extend(expired.iter().map(|r| (r.job_id, r.clone())));
            expired
        };

        for result in &expired {
            tracing::info!(
                job_id = %result.job_id,
                storage_key = %result.storage_key,
                expires_at = %result.expires_at,
                "Deleting expired result"
            );
            if let Err(e) = self.storage.delete(&result.storage_key).await {
                tracing::error!(
                    error = %e,
                    storage_key = %result.storage_key,
                    "Failed to delete expired result from storage"
                );
            }
        }

        expired.len()
    }

    /// Drop the tombstones of purged jobs.
    pub async fn forget(&self, job_ids: &[Uuid]) {
        let mut tombstones = self.tombstones.write().await;
        for job_id in job_ids {
            tombstones.remove(job_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convertease_core::models::{FormatCategory, JobStatus, Tier};
    use convertease_storage::InMemoryStorage;

    fn job(filename: &str) -> ConversionJob {
        ConversionJob {
            id: Uuid::new_v4(),
            upload_id: Uuid::new_v4(),
            client_id: "acme".to_string(),
            tier: Tier::Free,
            source_type: "text/plain".to_string(),
            source_filename: filename.to_string(),
            target_format: "PDF".to_string(),
            category: FormatCategory::Document,
            status: JobStatus::Running,
            settings: None,
            attempts: 1,
            cancel_requested: false,
            failure: None,
            result: None,
            created_at: Utc::now(),
            started_at: Some(Utc::now()),
            finished_at: None,
        }
    }

    fn output(data: &'static [u8]) -> ConvertedOutput {
        ConvertedOutput {
            data: Bytes::from_static(data),
            content_type: "application/pdf".to_string(),
            extension: "pdf".to_string(),
        }
    }

    #[test]
    fn test_download_filename() {
        assert_eq!(download_filename("report.final.txt", "pdf"), "report.final.pdf");
        assert_eq!(download_filename("README", "txt"), "README.txt");
        assert_eq!(download_filename(".env", "txt"), ".env.txt");
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = ResultStore::new(Arc::new(InMemoryStorage::new()));
        let job = job("notes.txt");

        let stored = store
            .put(&job, output(b"%PDF-"), chrono::Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(stored.filename, "notes.pdf");
        assert_eq!(stored.size_bytes, 5);
        assert_eq!(stored.summary().content_type, "application/pdf");

        let (result, data) = store.get(job.id).await.unwrap();
        assert_eq!(result.job_id, job.id);
        assert_eq!(&data[..], b"%PDF-");
    }

    #[tokio::test]
    async fn test_expired_result_is_never_served() {
        let store = ResultStore::new(Arc::new(InMemoryStorage::new()));
        let job = job("a.txt");
        store
            .put(&job, output(b"data"), chrono::Duration::zero())
            .await
            .unwrap();

        assert!(matches!(store.get(job.id).await, Err(AppError::Expired(_))));
        assert!(store.metadata(job.id).await.is_some());
    }

    #[tokio::test]
    async fn test_sweep_deletes_only_expired() {
        let storage = Arc::new(InMemoryStorage::new());
        let store = ResultStore::new(storage.clone());
        let short = job("a.txt");
        let long = job("b.txt");
        store.put(&short, output(b"a"), chrono::Duration::minutes(1)).await.unwrap();
        store.put(&long, output(b"b"), chrono::Duration::hours(2)).await.unwrap();

        let now = Utc::now() + chrono::Duration::minutes(5);
        assert_eq!(store.sweep_expired(now).await, 1);
        assert_eq!(store.sweep_expired(now).await, 0);

        assert!(store.get(long.id).await.is_ok());
        assert_eq!(storage.len().await, 1);
    }

    #[tokio::test]
    async fn test_swept_result_still_answers_expired() {
        let storage = Arc::new(InMemoryStorage::new());
        let store = ResultStore::new(storage.clone());
        let job = job("a.txt");
        store.put(&job, output(b"a"), chrono::Duration::minutes(1)).await.unwrap();

        assert_eq!(store.sweep_expired(Utc::now() + chrono::Duration::minutes(2)).await, 1);
        assert!(storage.is_empty().await);
        assert!(matches!(store.get(job.id).await, Err(AppError::Expired(_))));
        assert!(matches!(store.delete(job.id).await, Err(AppError::Expired(_))));
        assert_eq!(store.metadata(job.id).await.map(|r| r.client_id), Some("acme".to_string()));

        store.forget(&[job.id]).await;
        assert!(matches!(store.get(job.id).await, Err(AppError::NotFound(_))));
        assert!(store.metadata(job.id).await.is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let storage = Arc::new(InMemoryStorage::new());
        let store = ResultStore::new(storage.clone());
        let job = job("a.txt");
        store.put(&job, output(b"a"), chrono::Duration::hours(1)).await.unwrap();

        store.delete(job.id).await.unwrap();
        assert!(storage.is_empty().await);
        assert!(matches!(store.delete(job.id).await, Err(AppError::NotFound(_))));
        assert!(matches!(store.get(job.id).await, Err(AppError::NotFound(_))));
    }
}
