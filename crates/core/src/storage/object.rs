//! Object store backend using Apache OpenDAL.

use opendal::{ErrorKind, Operator, services};
use tracing::debug;

use super::backend::FragmentStore;
use super::config::ObjectStoreProvider;
use super::error::StorageError;

/// One object per fragment in a bucket.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    operator: Operator,
    provider: ObjectStoreProvider,
}

impl ObjectStore {
    /// Create an object store from provider configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider configuration is rejected.
    pub fn from_provider(provider: ObjectStoreProvider) -> Result<Self, StorageError> {
        let operator = Self::create_operator(&provider)?;
        Ok(Self { operator, provider })
    }

    /// In-process store for development and tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the memory service cannot be built.
    pub fn memory() -> Result<Self, StorageError> {
        Self::from_provider(ObjectStoreProvider::Memory)
    }

    fn create_operator(provider: &ObjectStoreProvider) -> Result<Operator, StorageError> {
        let operator = match provider {
            ObjectStoreProvider::S3 {
                endpoint,
                bucket,
                access_key_id,
                secret_access_key,
                region,
            } => {
                let builder = services::S3::default()
                    .endpoint(endpoint)
                    .bucket(bucket)
                    .access_key_id(access_key_id)
                    .secret_access_key(secret_access_key)
                    .region(region);
                Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
            }
            ObjectStoreProvider::Gcs {
                bucket,
                credential_path,
            } => {
                let mut builder = services::Gcs::default().bucket(bucket);
                if let Some(path) = credential_path {
                    let path = path
                        .to_str()
                        .ok_or_else(|| StorageError::configuration("invalid credential path"))?;
                    builder = builder.credential_path(path);
                }
                Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
            }
            ObjectStoreProvider::Memory => Operator::new(services::Memory::default())
                .map_err(|e| StorageError::configuration(e.to_string()))?
                .finish(),
        };

        Ok(operator)
    }

    /// Get the provider configuration.
    #[must_use]
    pub fn provider(&self) -> &ObjectStoreProvider {
        &self.provider
    }

    /// Get the bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        self.provider.bucket()
    }
}

impl FragmentStore for ObjectStore {
    fn name(&self) -> &'static str {
        self.provider.name()
    }

    async fn put(&self, key: &str, blob: Vec<u8>) -> Result<(), StorageError> {
        self.operator.write(key, blob).await?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let entries = match self.operator.list(prefix).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        // Some services echo the listed directory itself.
        Ok(entries
            .into_iter()
            .map(|entry| entry.path().to_string())
            .filter(|path| path.starts_with(prefix) && !path.ends_with('/'))
            .collect())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match self.operator.read(key).await {
            Ok(buffer) => Ok(Some(buffer.to_vec())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(key, "object vanished before read");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.operator.delete(key).await.map_err(StorageError::from)
    }

    /// Verify the bucket is reachable.
    ///
    /// Buckets are not created here; they must exist before startup.
    async fn provision(&self) -> Result<(), StorageError> {
        self.operator.check().await.map_err(StorageError::from)
    }
}
