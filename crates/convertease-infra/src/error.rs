//! HTTP error body
//!
//! `IntoResponse` for `AppError` lives in the API crate (orphan rule); this is
//! only the serialized shape shared by every endpoint.

use serde::Serialize;
use utoipa::ToSchema;

/// Standard error response format for HTTP APIs
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Client-facing message
    pub error: String,
    /// Stable error code, e.g. `QUEUE_FULL`
    pub code: String,
    /// Error family: validation, capacity, transient_backend, conversion_failed, not_found, unauthorized, internal
    pub kind: String,
    /// Whether retrying the same request later may succeed
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
