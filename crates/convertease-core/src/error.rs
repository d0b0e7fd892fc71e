//! Error types module
//!
//! `AppError` is the only error type that crosses the service boundary. Every
//! variant describes its own HTTP status, stable code and error kind through
//! [`ErrorMetadata`], so handlers never have to match on variants.
//!
//! Converter backends report [`ConversionError`]; the job manager maps those onto
//! a stored job failure before anything reaches a client.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::io;

use serde::{Deserialize, Serialize};

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like capacity limits
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Coarse error taxonomy exposed to clients as `kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Capacity,
    TransientBackend,
    ConversionFailed,
    NotFound,
    Unauthorized,
    Internal,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::Capacity => write!(f, "capacity"),
            ErrorKind::TransientBackend => write!(f, "transient_backend"),
            ErrorKind::ConversionFailed => write!(f, "conversion_failed"),
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::Unauthorized => write!(f, "unauthorized"),
            ErrorKind::Internal => write!(f, "internal"),
        }
    }
}

/// Metadata for error responses - defines how an error should be presented
/// This trait allows errors to self-describe their HTTP response characteristics
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "QUEUE_FULL")
    fn error_code(&self) -> &'static str;

    /// Taxonomy bucket the error belongs to
    fn kind(&self) -> ErrorKind;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Too many files: {count} provided, exactly one is accepted per request")]
    TooManyFiles { count: usize },

    #[error("File too large: {size} bytes exceeds the {limit} byte limit of the {tier} tier")]
    FileTooLarge { size: u64, limit: u64, tier: String },

    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Queue full: {active} active jobs reached the {tier} tier ceiling of {limit}")]
    QueueFull {
        tier: String,
        active: usize,
        limit: usize,
    },

    #[error("Cancellation not supported: {0}")]
    CancellationNotSupported(String),

    #[error("Conversion failed: {0}")]
    ConversionFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Expired: {0}")]
    Expired(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("UUID parsing error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, kind, recoverable, suggested_action, sensitive, log_level).
/// client_message stays per-variant for dynamic content.
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    ErrorKind,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::TooManyFiles { .. } => (
            400,
            "TOO_MANY_FILES",
            ErrorKind::Validation,
            false,
            Some("Upload exactly one file per request"),
            false,
            LogLevel::Debug,
        ),
        AppError::FileTooLarge { .. } => (
            413,
            "FILE_TOO_LARGE",
            ErrorKind::Validation,
            false,
            Some("Reduce file size or upgrade plan"),
            false,
            LogLevel::Debug,
        ),
        AppError::UnsupportedType(_) => (
            415,
            "UNSUPPORTED_TYPE",
            ErrorKind::Validation,
            false,
            Some("Check the list of supported formats"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            ErrorKind::Validation,
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::BadRequest(_) => (
            400,
            "BAD_REQUEST",
            ErrorKind::Validation,
            false,
            Some("Check request format and parameters"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidSettings(_) => (
            422,
            "INVALID_SETTINGS",
            ErrorKind::Validation,
            false,
            Some("Image settings only apply to image target formats"),
            false,
            LogLevel::Debug,
        ),
        AppError::QueueFull { .. } => (
            429,
            "QUEUE_FULL",
            ErrorKind::Capacity,
            true,
            Some("Retry later or upgrade plan"),
            false,
            LogLevel::Warn,
        ),
        AppError::CancellationNotSupported(_) => (
            409,
            "CANCELLATION_NOT_SUPPORTED",
            ErrorKind::Validation,
            false,
            Some("Wait for the job to finish"),
            false,
            LogLevel::Debug,
        ),
        AppError::ConversionFailed(_) => (
            422,
            "CONVERSION_FAILED",
            ErrorKind::ConversionFailed,
            false,
            Some("Check the source file or try a different target format"),
            false,
            LogLevel::Warn,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            ErrorKind::NotFound,
            false,
            Some("Verify the resource ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::Expired(_) => (
            404,
            "EXPIRED",
            ErrorKind::NotFound,
            false,
            Some("Convert the file again"),
            false,
            LogLevel::Debug,
        ),
        AppError::Unauthorized(_) => (
            401,
            "UNAUTHORIZED",
            ErrorKind::Unauthorized,
            false,
            Some("Check API key"),
            false,
            LogLevel::Debug,
        ),
        AppError::Storage(_) => (
            500,
            "STORAGE_ERROR",
            ErrorKind::Internal,
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            ErrorKind::Internal,
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::TooManyFiles { .. } => "TooManyFiles",
            AppError::FileTooLarge { .. } => "FileTooLarge",
            AppError::UnsupportedType(_) => "UnsupportedType",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::BadRequest(_) => "BadRequest",
            AppError::InvalidSettings(_) => "InvalidSettings",
            AppError::QueueFull { .. } => "QueueFull",
            AppError::CancellationNotSupported(_) => "CancellationNotSupported",
            AppError::ConversionFailed(_) => "ConversionFailed",
            AppError::NotFound(_) => "NotFound",
            AppError::Expired(_) => "Expired",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Storage(_) => "Storage",
            AppError::Internal(_) | AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn kind(&self) -> ErrorKind {
        app_error_static_metadata(self).2
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).3
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).4
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).5
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).6
    }

    fn client_message(&self) -> String {
        match self {
            AppError::TooManyFiles { count } => {
                format!("Exactly one file per request is accepted, got {}", count)
            }
            AppError::FileTooLarge { size, limit, tier } => format!(
                "File of {} bytes exceeds the {} tier limit of {} bytes",
                size, tier, limit
            ),
            AppError::QueueFull {
                tier,
                active,
                limit,
            } => format!(
                "Too many active conversions ({}/{}) for the {} tier",
                active, limit, tier
            ),
            AppError::UnsupportedType(ref msg)
            | AppError::InvalidInput(ref msg)
            | AppError::BadRequest(ref msg)
            | AppError::InvalidSettings(ref msg)
            | AppError::CancellationNotSupported(ref msg)
            | AppError::ConversionFailed(ref msg)
            | AppError::NotFound(ref msg)
            | AppError::Expired(ref msg)
            | AppError::Unauthorized(ref msg) => msg.clone(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}

/// Errors reported by converter backends.
///
/// The job manager's retry policy relies on [`ConversionError::is_transient`]:
/// transient failures get exactly one more attempt, everything else fails the job.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ConversionError {
    #[error("unsupported conversion from {from} to {to}")]
    UnsupportedConversion { from: String, to: String },

    #[error("corrupt input: {0}")]
    CorruptInput(String),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("conversion timed out after {0} seconds")]
    Timeout(u64),

    #[error("conversion cancelled")]
    Cancelled,

    #[error("failed to encode output: {0}")]
    EncodeFailed(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl ConversionError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ConversionError::ResourceExhausted(_)
                | ConversionError::Timeout(_)
                | ConversionError::Storage(_)
        )
    }

    /// Stable code stored on a failed job.
    pub fn code(&self) -> &'static str {
        match self {
            ConversionError::UnsupportedConversion { .. } => "UNSUPPORTED_CONVERSION",
            ConversionError::CorruptInput(_) => "CORRUPT_INPUT",
            ConversionError::ResourceExhausted(_) => "RESOURCE_EXHAUSTED",
            ConversionError::Timeout(_) => "TIMEOUT",
            ConversionError::Cancelled => "CANCELLED",
            ConversionError::EncodeFailed(_) => "ENCODE_FAILED",
            ConversionError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Kind a failed job reports to clients.
    pub fn kind(&self) -> ErrorKind {
        if self.is_transient() {
            ErrorKind::TransientBackend
        } else {
            ErrorKind::ConversionFailed
        }
    }
}

impl From<ConversionError> for AppError {
    fn from(err: ConversionError) -> Self {
        match err {
            ConversionError::UnsupportedConversion { from, to } => {
                AppError::UnsupportedType(format!("Cannot convert {} to {}", from, to))
            }
            ConversionError::Storage(msg) => AppError::Storage(msg),
            other => AppError::ConversionFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_not_found() {
        let err = AppError::NotFound("Job not found".to_string());
        assert_eq!(err.http_status_code(), 404);
        assert_eq!(err.error_code(), "NOT_FOUND");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!err.is_recoverable());
        assert_eq!(err.client_message(), "Job not found");
        assert!(!err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_error_metadata_expired_is_not_found_kind() {
        let err = AppError::Expired("Result expired".to_string());
        assert_eq!(err.http_status_code(), 404);
        assert_eq!(err.error_code(), "EXPIRED");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_error_metadata_queue_full() {
        let err = AppError::QueueFull {
            tier: "free".to_string(),
            active: 5,
            limit: 5,
        };
        assert_eq!(err.http_status_code(), 429);
        assert_eq!(err.error_code(), "QUEUE_FULL");
        assert_eq!(err.kind(), ErrorKind::Capacity);
        assert!(err.is_recoverable());
        assert_eq!(err.suggested_action(), Some("Retry later or upgrade plan"));
        assert!(err.client_message().contains("free"));
        assert_eq!(err.log_level(), LogLevel::Warn);
    }

    #[test]
    fn test_error_metadata_file_too_large() {
        let err = AppError::FileTooLarge {
            size: 2048,
            limit: 1024,
            tier: "free".to_string(),
        };
        assert_eq!(err.http_status_code(), 413);
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.client_message().contains("2048"));
        assert!(err.client_message().contains("1024"));
    }

    #[test]
    fn test_internal_errors_are_sensitive() {
        let err = AppError::from(anyhow::anyhow!("disk on fire"));
        assert_eq!(err.http_status_code(), 500);
        assert!(err.is_sensitive());
        assert_eq!(err.client_message(), "Internal server error");
        assert!(err.detailed_message().contains("disk on fire"));
    }

    #[test]
    fn test_conversion_error_transience() {
        assert!(ConversionError::Timeout(300).is_transient());
        assert!(ConversionError::ResourceExhausted("oom".into()).is_transient());
        assert!(!ConversionError::CorruptInput("bad".into()).is_transient());
        assert!(!ConversionError::Cancelled.is_transient());
        assert_eq!(
            ConversionError::Timeout(1).kind(),
            ErrorKind::TransientBackend
        );
    }

    #[test]
    fn test_unsupported_conversion_maps_to_unsupported_type() {
        let err: AppError = ConversionError::UnsupportedConversion {
            from: "application/msword".into(),
            to: "PDF".into(),
        }
        .into();
        assert_eq!(err.error_code(), "UNSUPPORTED_TYPE");
    }
}
