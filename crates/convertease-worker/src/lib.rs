//! ConvertEase job queue
//!
//! [`JobManager`] owns the job table, per-tier FIFO queues and per-client
//! counters, and runs the dispatcher that hands claimed jobs to a
//! [`JobExecutor`].

pub mod context;
pub mod queue;

pub use context::JobExecutor;
pub use queue::{CancelOutcome, JobCounts, JobManager, JobManagerConfig};
