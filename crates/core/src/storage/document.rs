//! Document storage built from append-only fragments.
//!
//! A document is never stored whole. Each `persist_doc` call adds one fragment under
//! `room/docname/<token>` and every read merges whatever fragments are listed at that
//! moment. Compaction writes the merged state as a fresh fragment and then deletes the
//! exact references that produced it, so fragments written during the read survive.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::join_all;
use tracing::{debug, info, warn};

use super::backend::FragmentStore;
use super::error::StorageError;
use crate::address::{FragmentAddress, document_prefix};
use crate::crdt;

/// Handle to one stored fragment, as returned by [`DocumentStorage::retrieve_doc`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageReference(String);

impl StorageReference {
    /// Wrap a raw storage key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The storage key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the address this reference points at.
    pub fn address(&self) -> Result<FragmentAddress, StorageError> {
        FragmentAddress::decode(&self.0)
    }
}

impl From<String> for StorageReference {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl fmt::Display for StorageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Merged document state and the fragments it was built from.
#[derive(Debug, Clone)]
pub struct RetrievedDoc {
    /// Merged state as a v2 update.
    pub state: Vec<u8>,
    /// References of every fragment included in `state`.
    pub references: Vec<StorageReference>,
}

/// Storage contract consumed by the document hub.
pub trait DocumentStorage: Send + Sync {
    /// Record an update as a new fragment.
    fn persist_doc(
        &self,
        room: &str,
        docname: &str,
        update: &[u8],
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Merge every visible fragment of a document. `None` if none exist.
    fn retrieve_doc(
        &self,
        room: &str,
        docname: &str,
    ) -> impl Future<Output = Result<Option<RetrievedDoc>, StorageError>> + Send;

    /// State vector of the merged document. `None` if no fragment exists.
    fn retrieve_state_vector(
        &self,
        room: &str,
        docname: &str,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, StorageError>> + Send {
        async move {
            self.retrieve_doc(room, docname)
                .await?
                .map(|doc| crdt::state_vector(&doc.state))
                .transpose()
        }
    }

    /// Delete exactly the given fragments.
    fn delete_references(
        &self,
        room: &str,
        docname: &str,
        references: &[StorageReference],
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Release backend resources. Safe to call more than once.
    fn destroy(&self) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// [`DocumentStorage`] on top of any [`FragmentStore`].
pub struct FragmentStorage<B> {
    backend: B,
    destroyed: AtomicBool,
}

impl<B: FragmentStore> FragmentStorage<B> {
    /// Wrap a fragment store.
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            destroyed: AtomicBool::new(false),
        }
    }

    /// Get the underlying fragment store.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run the backend's bucket/table ensure step.
    ///
    /// An "already exists" answer is logged and treated as success.
    pub async fn provision(&self) -> Result<(), StorageError> {
        match self.backend.provision().await {
            Err(err) if err.is_provisioning_conflict() => {
                info!(backend = self.backend.name(), error = %err, "storage already provisioned");
                Ok(())
            }
            other => other,
        }
    }

    /// Object stores drop empty path segments, so an empty room or document name
    /// would be written somewhere no later listing finds it. Every backend rejects them.
    fn check_names(room: &str, docname: &str) -> Result<(), StorageError> {
        if room.is_empty() || docname.is_empty() {
            return Err(StorageError::empty_name(room, docname));
        }
        Ok(())
    }

    /// Keys under the document prefix that decode back to the same document.
    ///
    /// Malformed keys are skipped so one bad object cannot hide a whole document.
    fn fragment_keys(room: &str, docname: &str, keys: Vec<String>) -> Vec<String> {
        keys.into_iter()
            .filter(|key| match FragmentAddress::decode(key) {
                Ok(addr) => addr.belongs_to(room, docname) && !addr.fragment.is_empty(),
                Err(err) => {
                    warn!(room, docname, key = %key, error = %err, "skipping malformed fragment key");
                    false
                }
            })
            .collect()
    }
}

impl<B> fmt::Debug for FragmentStorage<B>
where
    B: FragmentStore,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FragmentStorage")
            .field("backend", &self.backend.name())
            .field("destroyed", &self.destroyed.load(Ordering::Relaxed))
            .finish()
    }
}

impl<B: FragmentStore> DocumentStorage for FragmentStorage<B> {
    async fn persist_doc(
        &self,
        room: &str,
        docname: &str,
        update: &[u8],
    ) -> Result<(), StorageError> {
        Self::check_names(room, docname)?;
        let addr = FragmentAddress::new(room, docname);
        self.backend.put(&addr.encode(), update.to_vec()).await?;
        debug!(address = %addr, bytes = update.len(), "persisted fragment");
        Ok(())
    }

    async fn retrieve_doc(
        &self,
        room: &str,
        docname: &str,
    ) -> Result<Option<RetrievedDoc>, StorageError> {
        Self::check_names(room, docname)?;
        let prefix = document_prefix(room, docname);
        let keys = Self::fragment_keys(room, docname, self.backend.list(&prefix).await?);
        debug!(room, docname, fragments = keys.len(), "retrieving doc");

        if keys.is_empty() {
            return Ok(None);
        }

        let reads = keys
            .iter()
            .map(|key| async move { (key, self.backend.get(key).await) });
        let results = join_all(reads).await;

        let mut updates = Vec::with_capacity(results.len());
        let mut references = Vec::with_capacity(results.len());
        for (key, result) in results {
            let Some(blob) = result? else {
                continue;
            };
            match crdt::decode_update(&blob) {
                Ok(update) => {
                    updates.push(update);
                    references.push(StorageReference::new(key.clone()));
                }
                Err(err) => {
                    warn!(room, docname, key = %key, error = %err, "skipping undecodable fragment");
                }
            }
        }

        if references.is_empty() {
            return Ok(None);
        }

        let state = crdt::merge(updates)?;
        debug!(
            room,
            docname,
            merged = references.len(),
            bytes = state.len(),
            "retrieved doc"
        );
        Ok(Some(RetrievedDoc { state, references }))
    }

    async fn delete_references(
        &self,
        room: &str,
        docname: &str,
        references: &[StorageReference],
    ) -> Result<(), StorageError> {
        Self::check_names(room, docname)?;
        for reference in references {
            let addr = reference.address()?;
            if !addr.belongs_to(room, docname) {
                return Err(StorageError::ForeignReference {
                    reference: reference.to_string(),
                    room: room.to_string(),
                    docname: docname.to_string(),
                });
            }
        }

        // Stop at the first failure; references after it stay in place.
        for reference in references {
            self.backend.delete(reference.as_str()).await?;
        }
        debug!(room, docname, deleted = references.len(), "deleted references");
        Ok(())
    }

    async fn destroy(&self) -> Result<(), StorageError> {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.backend.close().await
    }
}

#[cfg(test)]
#[path = "document_tests.rs"]
mod tests;
