//! Job executor trait
//!
//! The services layer implements this trait; the worker calls `execute` for
//! every claimed job and `release` once the job can no longer run.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use convertease_core::models::{ConversionJob, ResultSummary};
use convertease_core::ConversionError;

#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Run one attempt of the conversion and store its result.
    ///
    /// Cooperative executors return `ConversionError::Cancelled` once `cancel`
    /// fires.
    async fn execute(
        &self,
        job: &ConversionJob,
        cancel: CancellationToken,
    ) -> Result<ResultSummary, ConversionError>;

    /// Whether a running job can be stopped through its cancellation token.
    fn supports_cancellation(&self, job: &ConversionJob) -> bool;

    /// Called once when the job reaches a terminal state.
    async fn release(&self, job: &ConversionJob);
}
