//! Fragment store primitives every backend implements.

use std::future::Future;

use super::error::StorageError;

/// Durable key/blob operations against one storage medium.
///
/// Keys are produced by [`crate::address`]. Implementations must tolerate concurrent
/// callers; nothing here requires read-after-write consistency.
pub trait FragmentStore: Send + Sync {
    /// Backend name used in logs.
    fn name(&self) -> &'static str;

    /// Store a blob under a key that has never been written before.
    fn put(
        &self,
        key: &str,
        blob: Vec<u8>,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// List every key starting with `prefix`.
    fn list(&self, prefix: &str) -> impl Future<Output = Result<Vec<String>, StorageError>> + Send;

    /// Read a blob. `None` when the key no longer exists.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>, StorageError>> + Send;

    /// Delete a blob. Deleting a missing key succeeds.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Ensure the bucket or table exists.
    ///
    /// May report [`StorageError::ProvisioningConflict`], which callers treat as success.
    fn provision(&self) -> impl Future<Output = Result<(), StorageError>> + Send {
        async { Ok(()) }
    }

    /// Release held resources.
    fn close(&self) -> impl Future<Output = Result<(), StorageError>> + Send {
        async { Ok(()) }
    }
}
