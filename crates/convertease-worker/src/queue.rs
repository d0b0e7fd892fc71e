//! Job queue: admission control, tier-priority dispatch, retry and cancellation.
//!
//! One mutex guards the job table, the per-tier FIFO queues and the per-client
//! counters. It is only held around state transitions, never across executor
//! work or storage I/O.
//!
//! Shutdown: [`JobManager::shutdown`] stops the dispatcher from claiming new
//! jobs; it does not wait for in-flight conversions.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify, OwnedSemaphorePermit, Semaphore};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use convertease_core::models::{
    ConversionJob, ConversionSettings, JobFailure, JobStatus, ResultSummary, Tier, TierTable,
    UploadedFile,
};
use convertease_core::{AppError, Config, ConversionError, FormatRegistry};

use crate::context::JobExecutor;

/// Attempts per job: the first run plus one retry of a transient failure.
pub const MAX_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone)]
pub struct JobManagerConfig {
    pub worker_pool_size: usize,
    pub poll_interval_ms: u64,
    pub conversion_timeout_secs: u64,
    pub retry_backoff_ms: u64,
}

impl Default for JobManagerConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: 4,
            poll_interval_ms: 500,
            conversion_timeout_secs: 300,
            retry_backoff_ms: 1000,
        }
    }
}

impl JobManagerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            worker_pool_size: config.worker_pool_size,
            poll_interval_ms: config.queue_poll_interval_ms,
            conversion_timeout_secs: config.conversion_timeout_secs,
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }
}

/// Result of a cancel request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The job is cancelled (it was queued, or had already been cancelled)
    Cancelled,
    /// The running backend was signalled and stops at its next check
    CancellationRequested,
    /// The job had already finished with this status
    Finished(JobStatus),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCounts {
    pub queued: usize,
    pub running: usize,
}

impl JobCounts {
    /// Jobs counted against the tier's active ceiling
    pub fn active(&self) -> usize {
        self.queued + self.running
    }
}

#[derive(Default)]
struct QueueState {
    jobs: HashMap<Uuid, ConversionJob>,
    queues: HashMap<Tier, VecDeque<Uuid>>,
    counts: HashMap<String, JobCounts>,
    tokens: HashMap<Uuid, CancellationToken>,
    used_uploads: HashSet<Uuid>,
}

impl QueueState {
    fn counts_mut(&mut self, client_id: &str) -> &mut JobCounts {
        self.counts.entry(client_id.to_string()).or_default()
    }

    /// Next queued job in tier priority order, FIFO within a tier, skipping
    /// clients already at their running limit.
    fn claim_next(&mut self, tiers: &TierTable) -> Option<(ConversionJob, CancellationToken)> {
        for tier in Tier::BY_PRIORITY {
            let max_running = tiers.get(tier).max_running_jobs;
            let Some(queue) = self.queues.get_mut(&tier) else {
                continue;
            };

            let position = queue.iter().position(|id| {
                self.jobs.get(id).is_some_and(|job| {
                    let running = self.counts.get(&job.client_id).map_or(0, |c| c.running);
                    running < max_running
                })
            });
            let Some(position) = position else {
                continue;
            };
            let Some(job_id) = queue.remove(position) else {
                continue;
            };
            let Some(job) = self.jobs.get_mut(&job_id) else {
                continue;
            };

            job.status = JobStatus::Running;
            job.started_at = Some(Utc::now());
            let job = job.clone();

            let counts = self.counts_mut(&job.client_id);
            counts.queued = counts.queued.saturating_sub(1);
            counts.running += 1;

            let token = self.tokens.entry(job_id).or_default().clone();
            return Some((job, token));
        }
        None
    }

    fn set_attempt(&mut self, job_id: Uuid, attempt: u32) {
        if let Some(job) = self.jobs.get_mut(&job_id) {
            job.attempts = attempt;
        }
    }

    /// Move a running job to its terminal state.
    fn finish(
        &mut self,
        job_id: Uuid,
        outcome: Result<ResultSummary, ConversionError>,
    ) -> Option<ConversionJob> {
        let job = self.jobs.get_mut(&job_id)?;
        if job.status != JobStatus::Running {
            return None;
        }

        match outcome {
            Ok(summary) => {
                job.status = JobStatus::Succeeded;
                job.result = Some(summary);
            }
            Err(ConversionError::Cancelled) => job.status = JobStatus::Cancelled,
            Err(err) => {
                job.status = JobStatus::Failed;
                job.failure = Some(JobFailure::from(&err));
            }
        }
        job.finished_at = Some(Utc::now());
        let job = job.clone();

        let counts = self.counts_mut(&job.client_id);
        counts.running = counts.running.saturating_sub(1);
        self.tokens.remove(&job_id);
        Some(job)
    }
}

struct Inner {
    state: Mutex<QueueState>,
    notify: Notify,
    registry: Arc<FormatRegistry>,
    tiers: TierTable,
    executor: Arc<dyn JobExecutor>,
    config: JobManagerConfig,
    shutdown: CancellationToken,
}

#[derive(Clone)]
pub struct JobManager {
    inner: Arc<Inner>,
}

impl JobManager {
    /// Create the manager and spawn its dispatcher on the current runtime.
    pub fn new(
        config: JobManagerConfig,
        registry: Arc<FormatRegistry>,
        tiers: TierTable,
        executor: Arc<dyn JobExecutor>,
    ) -> Self {
        let inner = Arc::new(Inner {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            registry,
            tiers,
            executor,
            config,
            shutdown: CancellationToken::new(),
        });

        tokio::spawn(Self::dispatcher(inner.clone()));

        Self { inner }
    }

    /// Queue a conversion of a staged upload.
    #[tracing::instrument(skip(self, upload, settings), fields(upload.id = %upload.id, client = %upload.client_id))]
    pub async fn submit(
        &self,
        upload: &UploadedFile,
        target_format: &str,
        settings: Option<ConversionSettings>,
    ) -> Result<ConversionJob, AppError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(AppError::Internal(
                "Job manager is shutting down".to_string(),
            ));
        }

        let format = self.inner.registry.get(target_format).ok_or_else(|| {
            AppError::UnsupportedType(format!("Unknown target format: {}", target_format))
        })?;
        if !self.inner.registry.is_compatible(&upload.content_type, &format.code) {
            return Err(AppError::UnsupportedType(format!(
                "Cannot convert {} to {}",
                upload.content_type, format.code
            )));
        }
        let settings = ConversionSettings::for_category(settings, format.category)?;
        let limits = self.inner.tiers.get(upload.tier);

        let job = {
            let mut state = self.inner.state.lock().await;

            if state.used_uploads.contains(&upload.id) {
                return Err(AppError::InvalidInput(format!(
                    "Upload {} already has a conversion job",
                    upload.id
                )));
            }

            let active = state
                .counts
                .get(&upload.client_id)
                .map_or(0, JobCounts::active);
            if active >= limits.max_active_jobs {
                tracing::info!(active, limit = limits.max_active_jobs, "Rejecting job, queue full");
                return Err(AppError::QueueFull {
                    tier: upload.tier.to_string(),
                    active,
                    limit: limits.max_active_jobs,
                });
            }

            let job = ConversionJob {
                id: Uuid::new_v4(),
                upload_id: upload.id,
                client_id: upload.client_id.clone(),
                tier: upload.tier,
                source_type: upload.content_type.clone(),
                source_filename: upload.filename.clone(),
                target_format: format.code.clone(),
                category: format.category,
                status: JobStatus::Queued,
                settings,
                attempts: 0,
                cancel_requested: false,
                failure: None,
                result: None,
                created_at: Utc::now(),
                started_at: None,
                finished_at: None,
            };

            state.used_uploads.insert(upload.id);
            state.queues.entry(job.tier).or_default().push_back(job.id);
            state.counts_mut(&job.client_id).queued += 1;
            state.tokens.insert(job.id, CancellationToken::new());
            state.jobs.insert(job.id, job.clone());
            job
        };

        tracing::info!(
            job_id = %job.id,
            target_format = %job.target_format,
            tier = %job.tier,
            "Conversion job queued"
        );
        self.inner.notify.notify_one();

        Ok(job)
    }

    pub async fn status(&self, job_id: Uuid) -> Result<ConversionJob, AppError> {
        self.inner
            .state
            .lock()
            .await
            .jobs
            .get(&job_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_id)))
    }

    /// Cancel a job. Repeating the call yields the same outcome.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, job_id: Uuid) -> Result<CancelOutcome, AppError> {
        let released = {
            let mut state = self.inner.state.lock().await;
            let job = state
                .jobs
                .get_mut(&job_id)
                .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_id)))?;

            match job.status {
                JobStatus::Queued => {
                    job.status = JobStatus::Cancelled;
                    job.cancel_requested = true;
                    job.finished_at = Some(Utc::now());
                    let job = job.clone();

                    if let Some(queue) = state.queues.get_mut(&job.tier) {
                        queue.retain(|id| *id != job_id);
                    }
                    let counts = state.counts_mut(&job.client_id);
                    counts.queued = counts.queued.saturating_sub(1);
                    state.tokens.remove(&job_id);
                    job
                }
                JobStatus::Running => {
                    if !self.inner.executor.supports_cancellation(job) {
                        return Err(AppError::CancellationNotSupported(format!(
                            "Job {} is running on a backend that cannot be interrupted",
                            job_id
                        )));
                    }
                    job.cancel_requested = true;
                    if let Some(token) = state.tokens.get(&job_id) {
                        token.cancel();
                    }
                    tracing::info!(job_id = %job_id, "Cancellation requested for running job");
                    return Ok(CancelOutcome::CancellationRequested);
                }
                JobStatus::Cancelled => return Ok(CancelOutcome::Cancelled),
                status => return Ok(CancelOutcome::Finished(status)),
            }
        };

        tracing::info!(job_id = %job_id, "Queued job cancelled");
        self.inner.executor.release(&released).await;
        Ok(CancelOutcome::Cancelled)
    }

    /// Jobs owned by a client, newest first.
    pub async fn list(&self, client_id: &str) -> Vec<ConversionJob> {
        let state = self.inner.state.lock().await;
        let mut jobs: Vec<ConversionJob> = state
            .jobs
            .values()
            .filter(|job| job.client_id == client_id)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    pub async fn counts(&self, client_id: &str) -> JobCounts {
        self.inner
            .state
            .lock()
            .await
            .counts
            .get(client_id)
            .copied()
            .unwrap_or_default()
    }

    /// Drop terminal jobs whose retention ended before `now`, returning them.
    pub async fn purge_finished(&self, now: DateTime<Utc>) -> Vec<ConversionJob> {
        let mut state = self.inner.state.lock().await;
        let expired: Vec<Uuid> = state
            .jobs
            .values()
            .filter(|job| {
                let retention = self.inner.tiers.get(job.tier).retention();
                job.retain_until(retention).is_some_and(|until| until <= now)
            })
            .map(|job| job.id)
            .collect();

        let purged: Vec<ConversionJob> = expired
            .iter()
            .filter_map(|id| state.jobs.remove(id))
            .collect();
        if !purged.is_empty() {
            tracing::debug!(count = purged.len(), "Purged finished jobs");
        }
        purged
    }

    /// Signals the dispatcher to stop claiming jobs.
    ///
    /// Returns immediately; running conversions continue until they finish or time out.
    pub fn shutdown(&self) {
        tracing::info!("Initiating job manager shutdown");
        self.inner.shutdown.cancel();
    }

    async fn dispatcher(inner: Arc<Inner>) {
        tracing::info!(
            worker_pool_size = inner.config.worker_pool_size,
            poll_interval_ms = inner.config.poll_interval_ms,
            "Job dispatcher started"
        );

        let semaphore = Arc::new(Semaphore::new(inner.config.worker_pool_size));
        let poll_interval = Duration::from_millis(inner.config.poll_interval_ms);

        loop {
            Self::claim_and_dispatch(&inner, &semaphore).await;

            tokio::select! {
                _ = inner.shutdown.cancelled() => {
                    tracing::info!("Job dispatcher shutting down");
                    break;
                }
                _ = inner.notify.notified() => {}
                _ = sleep(poll_interval) => {}
            }
        }

        tracing::info!("Job dispatcher stopped");
    }

    /// Claim jobs while workers are free.
    async fn claim_and_dispatch(inner: &Arc<Inner>, semaphore: &Arc<Semaphore>) {
        loop {
            let permit = match semaphore.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::trace!("No workers available, skipping claim");
                    return;
                }
            };

            let claimed = inner.state.lock().await.claim_next(&inner.tiers);
            match claimed {
                Some((job, token)) => {
                    tokio::spawn(Self::run_job(inner.clone(), job, token, permit));
                }
                None => {
                    drop(permit);
                    tracing::trace!("No claimable jobs in queue");
                    return;
                }
            }
        }
    }

    #[tracing::instrument(skip_all, fields(job.id = %job.id, job.target = %job.target_format))]
    async fn run_job(
        inner: Arc<Inner>,
        job: ConversionJob,
        token: CancellationToken,
        permit: OwnedSemaphorePermit,
    ) {
        tracing::info!(tier = %job.tier, "Conversion job started");
        let outcome = Self::execute_with_retry(&inner, &job, &token).await;

        match &outcome {
            Ok(summary) => tracing::info!(size_bytes = summary.size_bytes, "Conversion job succeeded"),
            Err(ConversionError::Cancelled) => tracing::info!("Conversion job cancelled"),
            Err(e) => tracing::error!(error = %e, code = e.code(), "Conversion job failed"),
        }

        let finished = inner.state.lock().await.finish(job.id, outcome);
        if let Some(finished) = finished {
            inner.executor.release(&finished).await;
        }
        drop(permit);
        inner.notify.notify_one();
    }

    async fn execute_with_retry(
        inner: &Inner,
        job: &ConversionJob,
        token: &CancellationToken,
    ) -> Result<ResultSummary, ConversionError> {
        let timeout_secs = inner.config.conversion_timeout_secs;
        let mut attempt = 0;

        loop {
            attempt += 1;
            inner.state.lock().await.set_attempt(job.id, attempt);

            let attempt_token = token.child_token();
            let execution = inner.executor.execute(job, attempt_token.clone());
            tokio::pin!(execution);
            let result = tokio::select! {
                result = &mut execution => result,
                _ = sleep(Duration::from_secs(timeout_secs)) => {
                    // The blocking conversion cannot be dropped; a retry only
                    // starts once this attempt has returned.
                    attempt_token.cancel();
                    tracing::warn!(timeout_secs, attempt, "Conversion attempt timed out, waiting for it to stop");
                    if let Ok(late) = execution.await {
                        tracing::warn!(size_bytes = late.size_bytes, "Discarding result of timed-out attempt");
                    }
                    if token.is_cancelled() {
                        Err(ConversionError::Cancelled)
                    } else {
                        Err(ConversionError::Timeout(timeout_secs))
                    }
                }
            };

            match result {
                Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS && !token.is_cancelled() => {
                    tracing::warn!(
                        error = %e,
                        attempt,
                        backoff_ms = inner.config.retry_backoff_ms,
                        "Transient conversion failure, retrying"
                    );
                    tokio::select! {
                        _ = sleep(Duration::from_millis(inner.config.retry_backoff_ms)) => {}
                        _ = token.cancelled() => return Err(ConversionError::Cancelled),
                    }
                }
                other => return other,
            }
        }
    }
}
