//! Service wiring: storage-backed intake and results, the job manager and
//! its executor, and the background cleanup loop.

use crate::state::AppState;
use convertease_core::{Config, FormatRegistry};
use convertease_services::{
    CleanupService, ConversionExecutor, ConverterRegistry, JobManager, JobManagerConfig,
    ResultStore, Storage, UploadIntake,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Build the application state. Must run inside a tokio runtime: the job
/// dispatcher and the cleanup loop are spawned here.
pub fn initialize_services(config: &Config, storage: Arc<dyn Storage>) -> Arc<AppState> {
    let registry = Arc::new(FormatRegistry::builtin());
    let tiers = config.tiers.clone();

    let intake = Arc::new(UploadIntake::new(
        storage.clone(),
        registry.clone(),
        tiers.clone(),
    ));
    let results = Arc::new(ResultStore::new(storage.clone()));

    let converters = Arc::new(ConverterRegistry::builtin(config.max_output_pixels));
    let executor = Arc::new(ConversionExecutor::new(
        intake.clone(),
        results.clone(),
        converters,
        registry.clone(),
        tiers.clone(),
    ));

    let job_config = JobManagerConfig::from_config(config);
    tracing::info!(
        worker_pool_size = job_config.worker_pool_size,
        conversion_timeout_secs = job_config.conversion_timeout_secs,
        "Starting job manager"
    );
    let jobs = JobManager::new(job_config, registry.clone(), tiers, executor);

    let shutdown = CancellationToken::new();
    let cleanup = Arc::new(CleanupService::new(
        results.clone(),
        jobs.clone(),
        intake.clone(),
        Duration::from_secs(config.cleanup_interval_secs.max(1)),
    ));
    cleanup.start(shutdown.clone());

    Arc::new(AppState {
        config: config.clone(),
        registry,
        storage,
        intake,
        results,
        jobs,
        shutdown,
    })
}
