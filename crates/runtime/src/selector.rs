//! Storage backend selection.
//!
//! The backend is chosen once at startup with fixed precedence:
//!
//! 1. S3 when `s3.endpoint` is set
//! 2. GCS when `gcs.project_id` is set
//! 3. Relational when `database.url` is set
//! 4. In-memory otherwise (development only)

use tracing::{info, warn};
use ystore_core::storage::{
    DocumentStorage, FragmentStorage, FragmentStore, ObjectStore, ObjectStoreProvider, RetrievedDoc,
    StorageError, StorageReference,
};
use ystore_db::FragmentRepository;
use ystore_shared::AppConfig;

use crate::error::StartupError;

/// Backend picked from configuration, before anything is connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendChoice {
    /// An OpenDAL object store.
    ObjectStore(ObjectStoreProvider),
    /// A SQL database.
    Relational {
        /// Connection URL.
        url: String,
        /// Pool upper bound.
        max_connections: u32,
        /// Pool lower bound.
        min_connections: u32,
    },
}

impl BackendChoice {
    /// Apply the selection precedence to `config`.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        if let Some(endpoint) = &config.s3.endpoint {
            return Self::ObjectStore(ObjectStoreProvider::s3(
                endpoint,
                &config.s3.bucket,
                &config.s3.access_key_id,
                &config.s3.secret_access_key,
                &config.s3.region,
            ));
        }
        if config.gcs.project_id.is_some() {
            return Self::ObjectStore(ObjectStoreProvider::gcs(
                &config.gcs.bucket,
                config.gcs.key_filename.clone(),
            ));
        }
        if let Some(url) = &config.database.url {
            return Self::Relational {
                url: url.clone(),
                max_connections: config.database.max_connections,
                min_connections: config.database.min_connections,
            };
        }
        Self::ObjectStore(ObjectStoreProvider::Memory)
    }

    /// Backend name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ObjectStore(provider) => provider.name(),
            Self::Relational { .. } => "relational",
        }
    }
}

/// The storage backend selected at startup.
#[derive(Debug)]
pub enum Storage {
    /// S3, GCS or in-memory.
    ObjectStore(FragmentStorage<ObjectStore>),
    /// Postgres or SQLite.
    Relational(FragmentStorage<FragmentRepository>),
}

impl Storage {
    /// Backend name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ObjectStore(storage) => storage.backend().name(),
            Self::Relational(storage) => storage.backend().name(),
        }
    }
}

impl DocumentStorage for Storage {
    async fn persist_doc(
        &self,
        room: &str,
        docname: &str,
        update: &[u8],
    ) -> Result<(), StorageError> {
        match self {
            Self::ObjectStore(storage) => storage.persist_doc(room, docname, update).await,
            Self::Relational(storage) => storage.persist_doc(room, docname, update).await,
        }
    }

    async fn retrieve_doc(
        &self,
        room: &str,
        docname: &str,
    ) -> Result<Option<RetrievedDoc>, StorageError> {
        match self {
            Self::ObjectStore(storage) => storage.retrieve_doc(room, docname).await,
            Self::Relational(storage) => storage.retrieve_doc(room, docname).await,
        }
    }

    async fn delete_references(
        &self,
        room: &str,
        docname: &str,
        references: &[StorageReference],
    ) -> Result<(), StorageError> {
        match self {
            Self::ObjectStore(storage) => {
                storage.delete_references(room, docname, references).await
            }
            Self::Relational(storage) => {
                storage.delete_references(room, docname, references).await
            }
        }
    }

    async fn destroy(&self) -> Result<(), StorageError> {
        match self {
            Self::ObjectStore(storage) => storage.destroy().await,
            Self::Relational(storage) => storage.destroy().await,
        }
    }
}

/// Select, connect and provision the storage backend.
///
/// "Already exists" answers from provisioning are logged and ignored; any other failure
/// aborts startup.
///
/// # Errors
///
/// Returns an error if the backend cannot be built, reached or provisioned.
pub async fn open_storage(config: &AppConfig) -> Result<Storage, StartupError> {
    let choice = BackendChoice::from_config(config);
    let backend = choice.name();

    match choice {
        BackendChoice::ObjectStore(provider) => {
            if provider.is_durable() {
                info!(backend, bucket = provider.bucket(), "using object store");
            } else {
                warn!("ATTENTION! using in-memory store, documents are lost on restart");
            }
            let store = ObjectStore::from_provider(provider)
                .map_err(|e| StartupError::storage(backend, e))?;
            let storage = FragmentStorage::new(store);
            storage
                .provision()
                .await
                .map_err(|e| StartupError::storage(backend, e))?;
            Ok(Storage::ObjectStore(storage))
        }
        BackendChoice::Relational {
            url,
            max_connections,
            min_connections,
        } => {
            info!(backend, "using relational store");
            let db = ystore_db::connect(&url, max_connections, min_connections)
                .await
                .map_err(|e| StartupError::database(e.to_string()))?;
            let storage = FragmentStorage::new(FragmentRepository::new(db));
            storage
                .provision()
                .await
                .map_err(|e| StartupError::storage(backend, e))?;
            Ok(Storage::Relational(storage))
        }
    }
}
