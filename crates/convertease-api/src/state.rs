//! Application state shared by every handler.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use convertease_core::{Config, FormatRegistry};
use convertease_services::{JobManager, ResultStore, Storage, UploadIntake};

pub struct AppState {
    pub config: Config,
    pub registry: Arc<FormatRegistry>,
    pub storage: Arc<dyn Storage>,
    pub intake: Arc<UploadIntake>,
    pub results: Arc<ResultStore>,
    pub jobs: JobManager,
    /// Cancelled on shutdown; stops the cleanup loop
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Stop background work: the cleanup loop and the job dispatcher.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.jobs.shutdown();
    }
}
