use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

use convertease_worker::JobManager;

use crate::intake::UploadIntake;
use crate::results::ResultStore;

/// What one cleanup pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub results: usize,
    pub jobs: usize,
    pub uploads: usize,
}

impl CleanupReport {
    pub fn total(&self) -> usize {
        self.results + self.jobs + self.uploads
    }
}

#[derive(Clone)]
pub struct CleanupService {
    results: Arc<ResultStore>,
    jobs: JobManager,
    intake: Arc<UploadIntake>,
    interval: Duration,
}

impl CleanupService {
    pub fn new(
        results: Arc<ResultStore>,
        jobs: JobManager,
        intake: Arc<UploadIntake>,
        interval: Duration,
    ) -> Self {
        Self {
            results,
            jobs,
            intake,
            interval,
        }
    }

    /// Start the background cleanup loop. It stops when `shutdown` is cancelled.
    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut cleanup_interval = interval(self.interval);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::info!("Cleanup task stopping");
                        break;
                    }
                    _ = cleanup_interval.tick() => {}
                }

                tracing::debug!("Starting scheduled cleanup of expired results");
                let report = self.run_once(Utc::now()).await;
                if report.total() > 0 {
                    tracing::info!(
                        results = report.results,
                        jobs = report.jobs,
                        uploads = report.uploads,
                        "Cleanup completed"
                    );
                }
            }
        })
    }

    /// One pass: expired results, terminal jobs past retention, unclaimed uploads.
    #[tracing::instrument(skip(self), fields(cleanup.operation = "expire_all"))]
    pub async fn run_once(&self, now: DateTime<Utc>) -> CleanupReport {
        let results = self.results.sweep_expired(now).await;
        let purged: Vec<_> = self
            .jobs
            .purge_finished(now)
            .await
            .into_iter()
            .map(|job| job.id)
            .collect();
        self.results.forget(&purged).await;
        let jobs = purged.len();
        let uploads = self.intake.sweep_unclaimed(now).await;

        CleanupReport {
            results,
            jobs,
            uploads,
        }
    }
}
