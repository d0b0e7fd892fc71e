//! Configuration module
//!
//! Everything is read from the environment (optionally seeded from `.env`),
//! so per-tier limits, retention, and pool sizing can be tuned without a rebuild.

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::models::{Tier, TierLimits, TierTable};

// Common constants
const SERVER_PORT: u16 = 4000;
const WORKER_POOL_SIZE: usize = 4;
const QUEUE_POLL_INTERVAL_MS: u64 = 500;
const CONVERSION_TIMEOUT_SECS: u64 = 300;
const RETRY_BACKOFF_MS: u64 = 1000;
const CLEANUP_INTERVAL_SECS: u64 = 60;
const MAX_OUTPUT_PIXELS: u64 = 400_000_000;
const MAX_CONCURRENT_REQUESTS: usize = 256;
const ANONYMOUS_CLIENT_ID: &str = "anonymous";

/// Where staged uploads and converted results live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Local,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "local" => Ok(StorageBackend::Local),
            _ => Err(anyhow::anyhow!("Invalid storage backend: {}", s)),
        }
    }
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StorageBackend::Memory => write!(f, "memory"),
            StorageBackend::Local => write!(f, "local"),
        }
    }
}

/// One configured API key and the client it authenticates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiKeyEntry {
    pub key: String,
    pub tier: Tier,
    pub client_id: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,
    pub max_concurrent_requests: usize,
    pub storage_backend: StorageBackend,
    pub local_storage_path: Option<String>,
    pub worker_pool_size: usize,
    pub queue_poll_interval_ms: u64,
    pub conversion_timeout_secs: u64,
    pub retry_backoff_ms: u64,
    pub cleanup_interval_secs: u64,
    pub max_output_pixels: u64,
    pub api_keys: Vec<ApiKeyEntry>,
    pub allow_anonymous: bool,
    pub tiers: TierTable,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: SERVER_PORT,
            environment: "development".to_string(),
            cors_origins: vec!["*".to_string()],
            max_concurrent_requests: MAX_CONCURRENT_REQUESTS,
            storage_backend: StorageBackend::Memory,
            local_storage_path: None,
            worker_pool_size: WORKER_POOL_SIZE,
            queue_poll_interval_ms: QUEUE_POLL_INTERVAL_MS,
            conversion_timeout_secs: CONVERSION_TIMEOUT_SECS,
            retry_backoff_ms: RETRY_BACKOFF_MS,
            cleanup_interval_secs: CLEANUP_INTERVAL_SECS,
            max_output_pixels: MAX_OUTPUT_PIXELS,
            api_keys: Vec::new(),
            allow_anonymous: true,
            tiers: TierTable::default(),
        }
    }
}

fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parses `key:tier:client_id` entries separated by commas.
pub fn parse_api_keys(raw: &str) -> Result<Vec<ApiKeyEntry>, anyhow::Error> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let mut parts = entry.splitn(3, ':');
            let (key, tier, client_id) = match (parts.next(), parts.next(), parts.next()) {
                (Some(k), Some(t), Some(c)) if !k.is_empty() && !c.is_empty() => (k, t, c),
                _ => {
                    return Err(anyhow::anyhow!(
                        "API_KEYS entries must look like key:tier:client_id"
                    ))
                }
            };
            Ok(ApiKeyEntry {
                key: key.to_string(),
                tier: tier.parse()?,
                client_id: client_id.to_string(),
            })
        })
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());
        let is_production = matches!(environment.to_lowercase().as_str(), "production" | "prod");

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => StorageBackend::Memory,
        };

        let api_keys = parse_api_keys(&env::var("API_KEYS").unwrap_or_default())?;

        let mut tiers = TierTable::default();
        for tier in Tier::BY_PRIORITY {
            let base = TierLimits::defaults_for(tier);
            let prefix = format!("TIER_{}", tier.as_str().to_uppercase());
            let max_upload_mb: u64 = parse_env(
                &format!("{}_MAX_UPLOAD_MB", prefix),
                base.max_upload_bytes / (1024 * 1024),
            );
            let retention_hours: u64 = parse_env(
                &format!("{}_RETENTION_HOURS", prefix),
                base.retention_secs / 3600,
            );
            tiers.set(
                tier,
                TierLimits {
                    max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
                    max_running_jobs: parse_env(
                        &format!("{}_MAX_RUNNING", prefix),
                        base.max_running_jobs,
                    ),
                    max_active_jobs: parse_env(
                        &format!("{}_MAX_ACTIVE", prefix),
                        base.max_active_jobs,
                    ),
                    retention_secs: retention_hours.saturating_mul(3600),
                },
            );
        }

        let config = Config {
            server_port: parse_env("PORT", defaults.server_port),
            cors_origins,
            max_concurrent_requests: parse_env(
                "MAX_CONCURRENT_REQUESTS",
                defaults.max_concurrent_requests,
            ),
            storage_backend,
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            worker_pool_size: parse_env("WORKER_POOL_SIZE", defaults.worker_pool_size),
            queue_poll_interval_ms: parse_env(
                "QUEUE_POLL_INTERVAL_MS",
                defaults.queue_poll_interval_ms,
            ),
            conversion_timeout_secs: parse_env(
                "CONVERSION_TIMEOUT_SECS",
                defaults.conversion_timeout_secs,
            ),
            retry_backoff_ms: parse_env("RETRY_BACKOFF_MS", defaults.retry_backoff_ms),
            cleanup_interval_secs: parse_env(
                "CLEANUP_INTERVAL_SECS",
                defaults.cleanup_interval_secs,
            ),
            max_output_pixels: parse_env("MAX_OUTPUT_PIXELS", defaults.max_output_pixels),
            api_keys,
            allow_anonymous: parse_env("ALLOW_ANONYMOUS", !is_production),
            tiers,
            environment,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.is_production() && self.cors_origins.iter().any(|o| o == "*") {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        if self.worker_pool_size == 0 {
            return Err(anyhow::anyhow!("WORKER_POOL_SIZE must be at least 1"));
        }

        if self.conversion_timeout_secs == 0 {
            return Err(anyhow::anyhow!("CONVERSION_TIMEOUT_SECS must be at least 1"));
        }

        if self.storage_backend == StorageBackend::Local && self.local_storage_path.is_none() {
            return Err(anyhow::anyhow!(
                "LOCAL_STORAGE_PATH must be set when using local storage backend"
            ));
        }

        if !self.allow_anonymous && self.api_keys.is_empty() {
            return Err(anyhow::anyhow!(
                "API_KEYS must be set when ALLOW_ANONYMOUS is false"
            ));
        }

        for tier in Tier::BY_PRIORITY {
            let limits = self.tiers.get(tier);
            if limits.max_running_jobs == 0 || limits.max_active_jobs < limits.max_running_jobs {
                return Err(anyhow::anyhow!(
                    "Tier {} needs MAX_RUNNING >= 1 and MAX_ACTIVE >= MAX_RUNNING",
                    tier
                ));
            }
            if limits.max_upload_bytes == 0 {
                return Err(anyhow::anyhow!("Tier {} MAX_UPLOAD_MB must be at least 1", tier));
            }
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        matches!(
            self.environment.to_lowercase().as_str(),
            "production" | "prod"
        )
    }

    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.cors_origins
    }

    pub fn anonymous_client_id(&self) -> &'static str {
        ANONYMOUS_CLIENT_ID
    }

    /// Largest upload any tier accepts; used to size the HTTP body limit.
    pub fn max_upload_bytes_any_tier(&self) -> u64 {
        Tier::BY_PRIORITY
            .iter()
            .map(|t| self.tiers.get(*t).max_upload_bytes)
            .max()
            .unwrap_or(0)
    }

    pub fn find_api_key(&self, key: &str) -> Option<&ApiKeyEntry> {
        self.api_keys.iter().find(|entry| entry.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_api_keys() {
        let keys = parse_api_keys("k1:pro:acme, k2:free:bob,").unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].tier, Tier::Pro);
        assert_eq!(keys[0].client_id, "acme");
        assert_eq!(keys[1].key, "k2");
    }

    #[test]
    fn test_parse_api_keys_rejects_malformed() {
        assert!(parse_api_keys("k1:pro").is_err());
        assert!(parse_api_keys("k1:gold:acme").is_err());
        assert!(parse_api_keys("").unwrap().is_empty());
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_upload_bytes_any_tier(), 20 * 1024 * 1024 * 1024);
    }

    #[test]
    fn test_production_rejects_wildcard_cors() {
        let config = Config {
            environment: "production".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_local_backend_requires_path() {
        let config = Config {
            storage_backend: StorageBackend::Local,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_closed_service_requires_keys() {
        let config = Config {
            allow_anonymous: false,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
