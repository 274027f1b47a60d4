//! Configuration for catalogsync.
//!
//! Provides typed configuration structs loaded from environment
//! variables (spec §6.5), with documented defaults for everything
//! optional. An optional YAML file can override values for local
//! development, following the same `Config`/`*Config` sub-section
//! pattern as the rest of this codebase.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingRequired(&'static str),
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Top-level configuration for catalogsync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub upstream: UpstreamConfig,
    pub document_store: DocumentStoreConfig,
    pub object_store: ObjectStoreConfig,
    pub sync: SyncDefaultsConfig,
    pub schedule: ScheduleConfig,
    pub logging: LoggingConfig,
    pub api: ApiConfig,
}

/// Credentials and endpoint for the upstream multi-dimensional table (spec §6.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub app_id: String,
    pub app_secret: String,
    pub app_token: String,
    pub table_id: String,
    /// Base URL of the upstream table API. Not part of the required
    /// env vars in spec §6.5, but every adapter needs an endpoint.
    pub base_url: String,
}

/// Document store connection settings (spec §6.5 `document-store URI`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentStoreConfig {
    pub uri: String,
}

/// Object store connection settings (spec §6.5, §6.4 canonical URL parts).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    /// `<scheme>://<host>:<port>` used to build canonical public URLs (spec §6.4).
    pub public_base_url: String,
}

/// Defaults for sync run options and rate governing (spec §6.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncDefaultsConfig {
    pub batch_size: u32,
    pub concurrent_images: u32,
    pub retry_attempts: u32,
    pub request_timeout_ms: u64,
    pub operation_deadline_ms: u64,
    pub upstream_rps: u32,
    pub image_rps: u32,
}

impl Default for SyncDefaultsConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            concurrent_images: 5,
            retry_attempts: 3,
            request_timeout_ms: 30_000,
            operation_deadline_ms: 14_400_000,
            upstream_rps: 10,
            image_rps: 10,
        }
    }
}

/// Cron-driven schedule settings (spec §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub full_sync_cron: Option<String>,
    pub incremental_sync_cron: Option<String>,
    pub validation_cron: Option<String>,
    pub timezone: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            full_sync_cron: None,
            incremental_sync_cron: None,
            validation_cron: None,
            timezone: "Asia/Shanghai".to_string(),
        }
    }
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// HTTP/WebSocket API bind settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub bind_addr: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

fn env_string(key: &'static str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingRequired(key))
}

fn env_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name: key, value: raw }),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables, per spec §6.5.
    ///
    /// Required: upstream credentials (app id, secret, app token, table
    /// id), document-store URI, object-store endpoint/credentials/bucket.
    /// Everything else falls back to the documented default.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingRequired` if a required variable is
    /// absent, or `ConfigError::InvalidValue` if an optional numeric
    /// variable fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let upstream = UpstreamConfig {
            app_id: env_string("CATALOGSYNC_UPSTREAM_APP_ID")?,
            app_secret: env_string("CATALOGSYNC_UPSTREAM_APP_SECRET")?,
            app_token: env_string("CATALOGSYNC_UPSTREAM_APP_TOKEN")?,
            table_id: env_string("CATALOGSYNC_UPSTREAM_TABLE_ID")?,
            base_url: std::env::var("CATALOGSYNC_UPSTREAM_BASE_URL")
                .unwrap_or_else(|_| "https://upstream.example.com".to_string()),
        };

        let document_store = DocumentStoreConfig {
            uri: env_string("CATALOGSYNC_DOCUMENT_STORE_URI")?,
        };

        let object_store = ObjectStoreConfig {
            endpoint: env_string("CATALOGSYNC_OBJECT_STORE_ENDPOINT")?,
            access_key: env_string("CATALOGSYNC_OBJECT_STORE_ACCESS_KEY")?,
            secret_key: env_string("CATALOGSYNC_OBJECT_STORE_SECRET_KEY")?,
            bucket: env_string("CATALOGSYNC_OBJECT_STORE_BUCKET")?,
            public_base_url: env_string("CATALOGSYNC_OBJECT_STORE_PUBLIC_BASE_URL")?,
        };

        let sync = SyncDefaultsConfig {
            batch_size: env_or("BATCH_SIZE", 50)?,
            concurrent_images: env_or("CONCURRENT_IMAGES", 5)?,
            retry_attempts: env_or("RETRY_ATTEMPTS", 3)?,
            request_timeout_ms: env_or("REQUEST_TIMEOUT_MS", 30_000)?,
            operation_deadline_ms: env_or("OPERATION_DEADLINE_MS", 14_400_000)?,
            upstream_rps: env_or("UPSTREAM_RPS", 10)?,
            image_rps: env_or("IMAGE_RPS", 10)?,
        };

        let schedule = ScheduleConfig {
            full_sync_cron: std::env::var("CATALOGSYNC_FULL_SYNC_CRON").ok(),
            incremental_sync_cron: std::env::var("CATALOGSYNC_INCREMENTAL_SYNC_CRON").ok(),
            validation_cron: std::env::var("CATALOGSYNC_VALIDATION_CRON").ok(),
            timezone: std::env::var("CATALOGSYNC_TIMEZONE")
                .unwrap_or_else(|_| "Asia/Shanghai".to_string()),
        };

        let logging = LoggingConfig {
            level: std::env::var("CATALOGSYNC_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            json: env_or("CATALOGSYNC_LOG_JSON", false)?,
        };

        let api = ApiConfig {
            bind_addr: std::env::var("CATALOGSYNC_API_BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        };

        Ok(Self {
            upstream,
            document_store,
            object_store,
            sync,
            schedule,
            logging,
            api,
        })
    }

    /// Loads a YAML override file and merges it by simply replacing the
    /// entire struct — local-dev convenience, not used in production.
    ///
    /// # Errors
    /// Returns `ConfigError::ReadFile` or `ConfigError::Parse` on failure.
    pub fn from_yaml_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&raw)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_defaults_match_spec() {
        let d = SyncDefaultsConfig::default();
        assert_eq!(d.batch_size, 50);
        assert_eq!(d.concurrent_images, 5);
        assert_eq!(d.retry_attempts, 3);
        assert_eq!(d.request_timeout_ms, 30_000);
        assert_eq!(d.operation_deadline_ms, 14_400_000);
        assert_eq!(d.upstream_rps, 10);
        assert_eq!(d.image_rps, 10);
    }

    #[test]
    fn schedule_default_timezone_is_shanghai() {
        assert_eq!(ScheduleConfig::default().timezone, "Asia/Shanghai");
    }
}
