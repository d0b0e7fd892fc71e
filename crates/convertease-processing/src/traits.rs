//! Core traits for converter backends
//!
//! Backends are synchronous and CPU-bound; callers run them on a blocking
//! thread. Cooperative backends poll the request's cancellation token between
//! internal steps.

use bytes::Bytes;
use convertease_core::models::{ConversionSettings, Format};
use convertease_core::ConversionError;
use tokio_util::sync::CancellationToken;

/// Everything a backend needs for one conversion.
pub struct ConversionRequest<'a> {
    pub input: &'a [u8],
    /// Normalized MIME type of the source
    pub source_type: &'a str,
    pub target: &'a Format,
    pub settings: Option<&'a ConversionSettings>,
    pub cancel: &'a CancellationToken,
}

impl ConversionRequest<'_> {
    /// Fails with `Cancelled` once cancellation was requested.
    pub fn checkpoint(&self, step: &str) -> Result<(), ConversionError> {
        if self.cancel.is_cancelled() {
            tracing::debug!(step, target_format = %self.target.code, "Conversion cancelled at checkpoint");
            return Err(ConversionError::Cancelled);
        }
        Ok(())
    }
}

/// Output of a successful conversion.
#[derive(Debug, Clone)]
pub struct ConvertedOutput {
    pub data: Bytes,
    pub content_type: String,
    pub extension: String,
}

impl ConvertedOutput {
    pub fn for_target(data: impl Into<Bytes>, target: &Format) -> Self {
        Self {
            data: data.into(),
            content_type: target.mime_type.clone(),
            extension: target.extension.clone(),
        }
    }
}

/// Converter backend trait - one implementation per format category
pub trait Converter: Send + Sync {
    /// Backend name used in logs
    fn name(&self) -> &'static str;

    /// Convert `request.input` into the target format
    fn convert(&self, request: &ConversionRequest<'_>) -> Result<ConvertedOutput, ConversionError>;

    /// Whether the backend checks the cancellation token while running
    fn supports_cancellation(&self) -> bool;
}
