//! OpenAPI documentation, served at [`crate::constants::OPENAPI_PATH`].

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::handlers;
use crate::setup::routes::health;
use convertease_core::models;

/// Registers the `bearer_auth` scheme referenced by protected paths.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ConvertEase API",
        version = "0.1.0",
        description = "File conversion service. Upload one file, queue a conversion to a compatible format, poll the job and download the result before it expires. Routes are versioned under /api/v1/."
    ),
    paths(
        handlers::uploads::upload_file,
        handlers::conversions::create_conversion,
        handlers::conversions::list_conversions,
        handlers::conversions::get_conversion,
        handlers::conversions::cancel_conversion,
        handlers::conversions::download_result,
        handlers::conversions::delete_result,
        handlers::formats::list_formats,
        health::health_check,
    ),
    components(
        schemas(
            handlers::uploads::UploadResponse,
            handlers::conversions::CreateConversionRequest,
            handlers::conversions::CreateConversionResponse,
            handlers::conversions::JobResponse,
            handlers::conversions::ResultInfo,
            handlers::conversions::CancelResponse,
            handlers::formats::FormatsResponse,
            handlers::formats::FormatGroup,
            health::HealthCheckResponse,
            models::Format,
            models::FormatCategory,
            models::ConversionSettings,
            models::ResizeMode,
            models::JobStatus,
            models::JobFailure,
            convertease_infra::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "uploads", description = "Validate and stage a file for conversion"),
        (name = "conversions", description = "Conversion jobs and their results"),
        (name = "formats", description = "Supported target formats"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;
