use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::ResultSummary;

/// A converted artifact owned by the result store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    pub job_id: Uuid,
    pub client_id: String,
    pub storage_key: String,
    pub content_type: String,
    pub filename: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ConversionResult {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn summary(&self) -> ResultSummary {
        ResultSummary {
            size_bytes: self.size_bytes,
            content_type: self.content_type.clone(),
            filename: self.filename.clone(),
            expires_at: self.expires_at,
        }
    }
}
