//! Application configuration management.
//!
//! Sources are layered in order: `config/default`, `config/{RUN_MODE}`, then environment
//! variables prefixed with `YSTORE_` using `__` between sections, e.g.
//! `YSTORE_S3__ENDPOINT` or `YSTORE_CALLBACK__TIMEOUT_SECS`. Every section is optional.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// S3-compatible object storage.
    pub s3: S3Config,
    /// Google Cloud Storage.
    pub gcs: GcsConfig,
    /// Relational database.
    pub database: DatabaseConfig,
    /// Update delivery endpoint.
    pub callback: CallbackConfig,
    /// Worker loop tuning.
    pub worker: WorkerConfig,
}

/// S3 configuration. Selected when `endpoint` is set.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct S3Config {
    /// Endpoint URL.
    pub endpoint: Option<String>,
    /// Bucket name.
    pub bucket: String,
    /// Access key ID.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Region.
    pub region: String,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint: None,
            bucket: default_bucket(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            region: "us-east-1".to_string(),
        }
    }
}

/// GCS configuration. Selected when `project_id` is set and S3 is not.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GcsConfig {
    /// Project ID.
    pub project_id: Option<String>,
    /// Service account key file.
    pub key_filename: Option<PathBuf>,
    /// Bucket name.
    pub bucket: String,
}

impl Default for GcsConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            key_filename: None,
            bucket: default_bucket(),
        }
    }
}

fn default_bucket() -> String {
    "ydocs".to_string()
}

/// Database configuration. Selected when `url` is set and no object store is.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: Option<String>,
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    pub min_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            min_connections: 1,
        }
    }
}

/// Update callback configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CallbackConfig {
    /// Base URL. Delivery is disabled when unset.
    pub url: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl CallbackConfig {
    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 30,
        }
    }
}

/// Worker loop configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Capacity of the task queue.
    pub queue_capacity: usize,
    /// Compact documents with at least this many fragments. `0` disables compaction.
    pub compaction_threshold: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            compaction_threshold: 0,
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("YSTORE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        config.try_deserialize()
    }
}
