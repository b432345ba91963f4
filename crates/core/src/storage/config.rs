//! Object store provider configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Object store provider configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectStoreProvider {
    /// S3-compatible storage: MinIO, Cloudflare R2, AWS S3
    S3 {
        /// S3 endpoint URL.
        endpoint: String,
        /// S3 bucket name.
        bucket: String,
        /// Access key ID.
        access_key_id: String,
        /// Secret access key.
        secret_access_key: String,
        /// Region.
        region: String,
    },
    /// Google Cloud Storage
    Gcs {
        /// GCS bucket name.
        bucket: String,
        /// Path to a service account key file. Falls back to ambient credentials.
        credential_path: Option<PathBuf>,
    },
    /// In-process store (development only, lost on restart)
    Memory,
}

impl ObjectStoreProvider {
    /// Create S3-compatible provider.
    #[must_use]
    pub fn s3(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self::S3 {
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: region.into(),
        }
    }

    /// Create Google Cloud Storage provider.
    #[must_use]
    pub fn gcs(bucket: impl Into<String>, credential_path: Option<PathBuf>) -> Self {
        Self::Gcs {
            bucket: bucket.into(),
            credential_path,
        }
    }

    /// Provider name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::S3 { .. } => "s3",
            Self::Gcs { .. } => "gcs",
            Self::Memory => "memory",
        }
    }

    /// Bucket name, or `memory` for the in-process store.
    #[must_use]
    pub fn bucket(&self) -> &str {
        match self {
            Self::S3 { bucket, .. } | Self::Gcs { bucket, .. } => bucket,
            Self::Memory => "memory",
        }
    }

    /// Whether data survives a process restart.
    #[must_use]
    pub const fn is_durable(&self) -> bool {
        !matches!(self, Self::Memory)
    }
}
