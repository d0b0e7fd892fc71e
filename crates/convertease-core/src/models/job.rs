use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ConversionError, ErrorKind};
use crate::models::{ConversionSettings, FormatCategory, Tier};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Queued | JobStatus::Running)
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Succeeded => write!(f, "succeeded"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            _ => Err(anyhow::anyhow!("Invalid job status: {}", s)),
        }
    }
}

/// Why a job failed, already mapped to the client-facing taxonomy.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct JobFailure {
    pub code: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&ConversionError> for JobFailure {
    fn from(err: &ConversionError) -> Self {
        Self {
            code: err.code().to_string(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Where and until when a finished artifact can be fetched.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ResultSummary {
    pub size_bytes: u64,
    pub content_type: String,
    pub filename: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConversionJob {
    pub id: Uuid,
    pub upload_id: Uuid,
    pub client_id: String,
    pub tier: Tier,
    /// Normalized MIME type of the staged upload
    pub source_type: String,
    pub source_filename: String,
    pub target_format: String,
    pub category: FormatCategory,
    pub status: JobStatus,
    pub settings: Option<ConversionSettings>,
    pub attempts: u32,
    pub cancel_requested: bool,
    pub failure: Option<JobFailure>,
    pub result: Option<ResultSummary>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ConversionJob {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Terminal jobs are kept for status queries until this instant: one
    /// retention window past the result's expiry, or past the finish time
    /// when there is no result.
    pub fn retain_until(&self, retention: chrono::Duration) -> Option<DateTime<Utc>> {
        if !self.is_terminal() {
            return None;
        }
        match &self.result {
            Some(result) => Some(result.expires_at + retention),
            None => self.finished_at.map(|t| t + retention),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_display_round_trip() {
        for status in [
            JobStatus::Queued,
            JobStatus::Running,
            JobStatus::Succeeded,
            JobStatus::Failed,
            JobStatus::Cancelled,
        ] {
            assert_eq!(status.to_string().parse::<JobStatus>().unwrap(), status);
        }
        assert!("pending".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    fn finished_job(result: Option<ResultSummary>) -> ConversionJob {
        let finished = Utc::now();
        ConversionJob {
            id: Uuid::new_v4(),
            upload_id: Uuid::new_v4(),
            client_id: "acme".to_string(),
            tier: Tier::Free,
            source_type: "text/plain".to_string(),
            source_filename: "a.txt".to_string(),
            target_format: "PDF".to_string(),
            category: FormatCategory::Document,
            status: JobStatus::Succeeded,
            settings: None,
            attempts: 1,
            cancel_requested: false,
            failure: None,
            result,
            created_at: finished,
            started_at: Some(finished),
            finished_at: Some(finished),
        }
    }

    #[test]
    fn test_retain_until_outlives_result_expiry() {
        let retention = chrono::Duration::hours(24);
        let expires_at = Utc::now() + chrono::Duration::hours(1);
        let job = finished_job(Some(ResultSummary {
            size_bytes: 3,
            content_type: "application/pdf".to_string(),
            filename: "a.pdf".to_string(),
            expires_at,
        }));
        assert_eq!(job.retain_until(retention), Some(expires_at + retention));

        let failed = finished_job(None);
        assert_eq!(
            failed.retain_until(retention),
            failed.finished_at.map(|t| t + retention)
        );

        let mut running = finished_job(None);
        running.status = JobStatus::Running;
        assert_eq!(running.retain_until(retention), None);
    }

    #[test]
    fn test_failure_from_conversion_error() {
        let failure = JobFailure::from(&ConversionError::Timeout(300));
        assert_eq!(failure.code, "TIMEOUT");
        assert_eq!(failure.kind, ErrorKind::TransientBackend);
    }
}
