//! Runs one conversion job: staged bytes in, stored result out.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use convertease_core::models::{ConversionJob, JobStatus, ResultSummary, TierTable};
use convertease_core::{ConversionError, FormatRegistry};
use convertease_processing::{ConversionRequest, ConverterRegistry};
use convertease_worker::JobExecutor;

use crate::intake::UploadIntake;
use crate::results::ResultStore;

pub struct ConversionExecutor {
    intake: Arc<UploadIntake>,
    results: Arc<ResultStore>,
    converters: Arc<ConverterRegistry>,
    registry: Arc<FormatRegistry>,
    tiers: TierTable,
}

impl ConversionExecutor {
    pub fn new(
        intake: Arc<UploadIntake>,
        results: Arc<ResultStore>,
        converters: Arc<ConverterRegistry>,
        registry: Arc<FormatRegistry>,
        tiers: TierTable,
    ) -> Self {
        Self {
            intake,
            results,
            converters,
            registry,
            tiers,
        }
    }

    fn unsupported(job: &ConversionJob) -> ConversionError {
        ConversionError::UnsupportedConversion {
            from: job.source_type.clone(),
            to: job.target_format.clone(),
        }
    }
}

#[async_trait]
impl JobExecutor for ConversionExecutor {
    async fn execute(
        &self,
        job: &ConversionJob,
        cancel: CancellationToken,
    ) -> Result<ResultSummary, ConversionError> {
        let target = self
            .registry
            .get(&job.target_format)
            .cloned()
            .ok_or_else(|| Self::unsupported(job))?;
        let converter = self
            .converters
            .get(job.category)
            .ok_or_else(|| Self::unsupported(job))?;

        let upload = self.intake.find(job.upload_id).await.ok_or_else(|| {
            ConversionError::Storage(format!("Staged upload {} is gone", job.upload_id))
        })?;
        let input = self
            .intake
            .read(&upload)
            .await
            .map_err(|e| ConversionError::Storage(e.to_string()))?;

        tracing::debug!(
            job_id = %job.id,
            backend = converter.name(),
            input_bytes = input.len(),
            "Running converter"
        );

        let source_type = job.source_type.clone();
        let settings = job.settings.clone();
        let output = tokio::task::spawn_blocking(move || {
            converter.convert(&ConversionRequest {
                input: &input,
                source_type: &source_type,
                target: &target,
                settings: settings.as_ref(),
                cancel: &cancel,
            })
        })
        .await
        .map_err(|e| ConversionError::EncodeFailed(format!("Converter task failed: {}", e)))??;

        let retention = self.tiers.get(job.tier).retention();
        let result = self
            .results
            .put(job, output, retention)
            .await
            .map_err(|e| ConversionError::Storage(e.to_string()))?;

        Ok(result.summary())
    }

    fn supports_cancellation(&self, job: &ConversionJob) -> bool {
        self.converters
            .get(job.category)
            .is_some_and(|converter| converter.supports_cancellation())
    }

    async fn release(&self, job: &ConversionJob) {
        self.intake.discard(job.upload_id).await;
        // A timed-out attempt may still have stored its output
        if job.status != JobStatus::Succeeded && self.results.metadata(job.id).await.is_some() {
            if let Err(e) = self.results.delete(job.id).await {
                tracing::warn!(job_id = %job.id, error = %e, "Failed to drop result of unsuccessful job");
            }
        }
    }
}
