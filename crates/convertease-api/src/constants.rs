//! API path constants.

/// Versioned prefix every resource route is nested under
pub const API_PREFIX: &str = "/api/v1";

/// Where the generated OpenAPI document is served
pub const OPENAPI_PATH: &str = "/api/openapi.json";

/// Where the RapiDoc viewer is mounted
pub const DOCS_PATH: &str = "/docs";

/// Headroom on top of the largest tier limit for the multipart envelope
pub const MULTIPART_ENVELOPE_BYTES: u64 = 64 * 1024;
