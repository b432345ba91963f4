//! Relational fragment store.
//!
//! One row per fragment keyed by `(room, docname, fragment)`. Storage keys coming in
//! from the document layer are decoded back into those three columns, and listings are
//! re-encoded, so references stay identical to the object store ones.

use chrono::Utc;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QuerySelect, Set,
};
use sea_orm_migration::MigratorTrait;
use tracing::debug;

use crate::entities::fragments;
use crate::migration::Migrator;
use ystore_core::address::{FragmentAddress, encode_key};
use ystore_core::storage::{FragmentStore, StorageError};

const BACKEND: &str = "relational";

/// Fragment store backed by a SQL table.
#[derive(Debug, Clone)]
pub struct FragmentRepository {
    db: DatabaseConnection,
}

impl FragmentRepository {
    /// Create a new fragment repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Get the database connection.
    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

impl FragmentStore for FragmentRepository {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn put(&self, key: &str, blob: Vec<u8>) -> Result<(), StorageError> {
        let addr = fragment_address(key)?;
        let row = fragments::ActiveModel {
            room: Set(addr.room),
            docname: Set(addr.docname),
            fragment: Set(addr.fragment),
            data: Set(blob),
            created_at: Set(Utc::now().into()),
        };

        fragments::Entity::insert(row)
            .exec_without_returning(&self.db)
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let addr = FragmentAddress::decode(prefix)?;
        let rows: Vec<String> = fragments::Entity::find()
            .select_only()
            .column(fragments::Column::Fragment)
            .filter(fragments::Column::Room.eq(addr.room.as_str()))
            .filter(fragments::Column::Docname.eq(addr.docname.as_str()))
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(backend_error)?;

        Ok(rows
            .into_iter()
            .filter(|fragment| fragment.starts_with(addr.fragment.as_str()))
            .map(|fragment| encode_key(&addr.room, &addr.docname, &fragment))
            .collect())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let addr = fragment_address(key)?;
        fragments::Entity::find()
            .select_only()
            .column(fragments::Column::Data)
            .filter(fragments::Column::Room.eq(addr.room))
            .filter(fragments::Column::Docname.eq(addr.docname))
            .filter(fragments::Column::Fragment.eq(addr.fragment))
            .into_tuple::<Vec<u8>>()
            .one(&self.db)
            .await
            .map_err(backend_error)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let addr = fragment_address(key)?;
        let result = fragments::Entity::delete_many()
            .filter(fragments::Column::Room.eq(addr.room))
            .filter(fragments::Column::Docname.eq(addr.docname))
            .filter(fragments::Column::Fragment.eq(addr.fragment))
            .exec(&self.db)
            .await
            .map_err(backend_error)?;

        debug!(key, rows = result.rows_affected, "deleted fragment row");
        Ok(())
    }

    /// Run pending migrations.
    async fn provision(&self) -> Result<(), StorageError> {
        Migrator::up(&self.db, None).await.map_err(|err| {
            if is_already_exists(&err) {
                StorageError::ProvisioningConflict(err.to_string())
            } else {
                backend_error(err)
            }
        })
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.db.clone().close().await.map_err(backend_error)
    }
}

/// Decode a key that must name a concrete fragment.
fn fragment_address(key: &str) -> Result<FragmentAddress, StorageError> {
    let addr = FragmentAddress::decode(key)?;
    if addr.fragment.is_empty() {
        return Err(StorageError::malformed_key(key));
    }
    Ok(addr)
}

fn backend_error(err: DbErr) -> StorageError {
    StorageError::backend(BACKEND, err.to_string())
}

/// Concurrent startups can race on `CREATE TABLE`; the loser sees "already exists".
fn is_already_exists(err: &DbErr) -> bool {
    err.to_string().contains("already exists")
}
