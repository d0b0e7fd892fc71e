//! Application setup and initialization
//!
//! Kept out of main.rs so tests can build the same state and router
//! without binding a socket or installing a global subscriber.

pub mod routes;
pub mod server;
pub mod services;

use crate::state::AppState;
use anyhow::{Context, Result};
use convertease_core::Config;
use convertease_infra::{init_telemetry, LogFormat};
use std::sync::Arc;

const SERVICE_NAME: &str = "convertease-api";

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    config.validate().context("Configuration validation failed")?;

    init_telemetry(LogFormat::for_environment(config.environment()), SERVICE_NAME)
        .context("Failed to initialize telemetry")?;

    tracing::info!(
        environment = %config.environment(),
        storage_backend = ?config.storage_backend,
        "Configuration loaded and validated successfully"
    );

    let storage = convertease_services::create_storage(&config)
        .await
        .context("Failed to initialize storage")?;

    let state = services::initialize_services(&config, storage);

    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
