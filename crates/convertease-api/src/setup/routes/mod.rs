//! Route configuration and setup.
//!
//! Health checks live in [health](health).

pub mod health;

use crate::api_doc::ApiDoc;
use crate::auth::{auth_middleware, AuthState};
use crate::constants::{API_PREFIX, DOCS_PATH, MULTIPART_ENVELOPE_BYTES, OPENAPI_PATH};
use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use convertease_core::Config;
use convertease_infra::{request_id_middleware, security_headers_middleware};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;
    let auth_state = Arc::new(AuthState::from_config(config));

    let protected_routes = protected_routes().layer(axum::middleware::from_fn_with_state(
        auth_state,
        auth_middleware,
    ));

    let api = public_routes().merge(protected_routes);

    let body_limit = config
        .max_upload_bytes_any_tier()
        .saturating_add(MULTIPART_ENVELOPE_BYTES);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    let concurrency_limit = config.max_concurrent_requests.max(1);
    tracing::info!(concurrency_limit, body_limit, "HTTP limits configured");

    let app = Router::new()
        .nest(API_PREFIX, api)
        .route("/health", get(health::health_check))
        .route("/live", get(health::liveness_check))
        .merge(
            utoipa_rapidoc::RapiDoc::with_openapi(OPENAPI_PATH, ApiDoc::openapi()).path(DOCS_PATH),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(ConcurrencyLimitLayer::new(concurrency_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .with_state(state);

    Ok(app)
}

/// Routes reachable without credentials.
fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/formats", get(handlers::formats::list_formats))
}

/// Routes that need a client identity, installed by the auth middleware.
fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/uploads", post(handlers::uploads::upload_file))
        .route(
            "/conversions",
            post(handlers::conversions::create_conversion)
                .get(handlers::conversions::list_conversions),
        )
        .route(
            "/conversions/{job_id}",
            get(handlers::conversions::get_conversion)
                .delete(handlers::conversions::cancel_conversion),
        )
        .route(
            "/conversions/{job_id}/result",
            get(handlers::conversions::download_result)
                .delete(handlers::conversions::delete_result),
        )
}

/// Setup CORS configuration
fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers(Any)
    };
    Ok(cors)
}
