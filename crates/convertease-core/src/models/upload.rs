use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{FormatCategory, Tier};

/// A validated file held in staging storage.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadedFile {
    pub id: Uuid,
    pub client_id: String,
    pub tier: Tier,
    /// Sanitized original filename
    pub filename: String,
    /// Normalized declared MIME type
    pub content_type: String,
    /// Family the content sniffer recognised
    pub category: FormatCategory,
    pub size_bytes: u64,
    pub storage_key: String,
    pub created_at: DateTime<Utc>,
}

impl UploadedFile {
    /// Filename without its extension, used to name converted artifacts.
    pub fn stem(&self) -> &str {
        match self.filename.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.filename,
        }
    }
}
