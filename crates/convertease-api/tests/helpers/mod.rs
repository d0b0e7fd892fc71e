//! Test helpers: build AppState and router for integration tests.
//!
//! Run from workspace root: `cargo test -p convertease-api`. Everything runs
//! against in-memory storage; no external services are needed.

#![allow(dead_code)]

pub mod fixtures;

use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestResponse, TestServer};
use convertease_api::constants;
use convertease_api::setup::{routes, services};
use convertease_api::state::AppState;
use convertease_core::models::{Tier, TierLimits};
use convertease_core::{ApiKeyEntry, Config};
use convertease_services::{InMemoryStorage, Storage};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub const ACME_KEY: &str = "test-key-acme-pro";
pub const BOB_KEY: &str = "test-key-bob-free";

/// API path prefix for tests (e.g. `/api/v1`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", constants::API_PREFIX, path)
}

/// Fast polling and retries, two keyed clients, anonymous access on.
pub fn test_config() -> Config {
    Config {
        queue_poll_interval_ms: 10,
        retry_backoff_ms: 10,
        conversion_timeout_secs: 30,
        api_keys: vec![
            ApiKeyEntry {
                key: ACME_KEY.to_string(),
                tier: Tier::Pro,
                client_id: "acme".to_string(),
            },
            ApiKeyEntry {
                key: BOB_KEY.to_string(),
                tier: Tier::Free,
                client_id: "bob".to_string(),
            },
        ],
        ..Config::default()
    }
}

/// `test_config` with the given limits for one tier.
pub fn config_with_limits(tier: Tier, limits: TierLimits) -> Config {
    let mut config = test_config();
    config.tiers.set(tier, limits);
    config
}

/// Test application: server plus the state behind it.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    /// Same storage the app writes to, for asserting what is left behind
    pub storage: Arc<InMemoryStorage>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let storage = Arc::new(InMemoryStorage::new());
        let state = services::initialize_services(&config, storage.clone() as Arc<dyn Storage>);
        let router = routes::setup_routes(&config, state.clone()).expect("build router");
        let server = TestServer::new(router).expect("start test server");
        Self {
            server,
            state,
            storage,
        }
    }

    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Upload one file, optionally authenticated.
    pub async fn upload(
        &self,
        key: Option<&str>,
        filename: &str,
        mime: &str,
        data: Vec<u8>,
    ) -> TestResponse {
        let form = MultipartForm::new().add_part(
            "file",
            Part::bytes(data).file_name(filename).mime_type(mime),
        );
        let mut request = self.server.post(&api_path("/uploads")).multipart(form);
        if let Some(key) = key {
            request = request.add_header("Authorization", format!("Bearer {}", key));
        }
        request.await
    }

    /// Upload and return the new upload id; panics unless the upload was accepted.
    pub async fn upload_ok(&self, key: Option<&str>, filename: &str, mime: &str, data: Vec<u8>) -> String {
        let response = self.upload(key, filename, mime, data).await;
        assert_eq!(response.status_code(), 201, "upload failed: {}", response.text());
        response.json::<Value>()["upload_id"]
            .as_str()
            .expect("upload_id")
            .to_string()
    }

    pub async fn convert(
        &self,
        key: Option<&str>,
        upload_id: &str,
        target_format: &str,
        settings: Option<Value>,
    ) -> TestResponse {
        let mut body = serde_json::json!({
            "upload_id": upload_id,
            "target_format": target_format,
        });
        if let Some(settings) = settings {
            body["settings"] = settings;
        }
        let mut request = self.server.post(&api_path("/conversions")).json(&body);
        if let Some(key) = key {
            request = request.add_header("Authorization", format!("Bearer {}", key));
        }
        request.await
    }

    /// Submit and return the job id; panics unless the job was accepted.
    pub async fn convert_ok(&self, key: Option<&str>, upload_id: &str, target_format: &str) -> String {
        let response = self.convert(key, upload_id, target_format, None).await;
        assert_eq!(response.status_code(), 202, "submit failed: {}", response.text());
        response.json::<Value>()["job_id"]
            .as_str()
            .expect("job_id")
            .to_string()
    }

    pub async fn get(&self, key: Option<&str>, path: &str) -> TestResponse {
        let mut request = self.server.get(&api_path(path));
        if let Some(key) = key {
            request = request.add_header("Authorization", format!("Bearer {}", key));
        }
        request.await
    }

    pub async fn delete(&self, key: Option<&str>, path: &str) -> TestResponse {
        let mut request = self.server.delete(&api_path(path));
        if let Some(key) = key {
            request = request.add_header("Authorization", format!("Bearer {}", key));
        }
        request.await
    }

    /// Poll a job until it reaches a terminal status.
    pub async fn wait_for_job(&self, key: Option<&str>, job_id: &str) -> Value {
        for _ in 0..500 {
            let job = self
                .get(key, &format!("/conversions/{}", job_id))
                .await
                .json::<Value>();
            match job["status"].as_str() {
                Some("queued") | Some("running") => {
                    tokio::time::sleep(Duration::from_millis(10)).await
                }
                _ => return job,
            }
        }
        panic!("job {} did not finish in time", job_id);
    }
}
