//! ConvertEase Services Layer
//!
//! Business services between the HTTP surface and the lower crates: upload
//! intake, the result store, the job executor that ties converters to storage,
//! and the background cleanup. Re-exports what the API crate needs so it
//! depends on a single service facade.

pub mod cleanup;
pub mod executor;
pub mod intake;
pub mod results;

pub use cleanup::{CleanupReport, CleanupService};
pub use executor::ConversionExecutor;
pub use intake::{IncomingFile, UploadIntake};
pub use results::{download_filename, ResultStore};

pub use convertease_processing::ConverterRegistry;
pub use convertease_storage::{create_storage, ByteStream, InMemoryStorage, Storage, StorageError};
pub use convertease_worker::{CancelOutcome, JobCounts, JobManager, JobManagerConfig};

use convertease_core::AppError;

/// Map a storage failure onto the service error taxonomy.
pub(crate) fn map_storage_error(err: StorageError) -> AppError {
    match err {
        StorageError::NotFound(key) => AppError::NotFound(format!("Stored object {} not found", key)),
        StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
        other => AppError::Storage(other.to_string()),
    }
}
