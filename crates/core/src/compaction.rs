//! Fragment compaction.
//!
//! When to compact is a policy decision left to the caller; this module only knows how.
//! The merged state is persisted as a new fragment before any old reference is deleted,
//! and only the references that went into the merge are deleted.

use tracing::info;

use crate::storage::{DocumentStorage, RetrievedDoc, StorageError};

/// Decides whether a document should be compacted after a read.
pub trait CompactionPolicy: Send + Sync {
    /// `fragments` is the number of references the read merged.
    fn should_compact(&self, fragments: usize) -> bool;
}

/// Never compact.
#[derive(Debug, Clone, Copy, Default)]
pub struct Never;

impl CompactionPolicy for Never {
    fn should_compact(&self, _fragments: usize) -> bool {
        false
    }
}

/// Compact once a document has at least `min_fragments` fragments.
#[derive(Debug, Clone, Copy)]
pub struct FragmentThreshold {
    min_fragments: usize,
}

impl FragmentThreshold {
    /// Create a threshold policy. Values below 2 are raised to 2, since compacting a
    /// single fragment only rewrites it.
    #[must_use]
    pub fn new(min_fragments: usize) -> Self {
        Self {
            min_fragments: min_fragments.max(2),
        }
    }

    /// The effective threshold.
    #[must_use]
    pub const fn min_fragments(&self) -> usize {
        self.min_fragments
    }
}

impl CompactionPolicy for FragmentThreshold {
    fn should_compact(&self, fragments: usize) -> bool {
        fragments >= self.min_fragments
    }
}

/// Result of a compaction attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionOutcome {
    /// The policy declined.
    Skipped,
    /// Merged state written and `removed` old fragments deleted.
    Compacted {
        /// Number of fragments deleted.
        removed: usize,
    },
}

/// Compact a document that was just read, if the policy agrees.
///
/// # Errors
///
/// Returns the storage error of the persist or delete step. If persisting fails nothing
/// is deleted; if a delete fails the merged fragment and the remaining old fragments
/// coexist, which merges to the same state.
pub async fn compact<S, P>(
    storage: &S,
    room: &str,
    docname: &str,
    doc: &RetrievedDoc,
    policy: &P,
) -> Result<CompactionOutcome, StorageError>
where
    S: DocumentStorage,
    P: CompactionPolicy + ?Sized,
{
    if !policy.should_compact(doc.references.len()) {
        return Ok(CompactionOutcome::Skipped);
    }

    storage.persist_doc(room, docname, &doc.state).await?;
    storage
        .delete_references(room, docname, &doc.references)
        .await?;

    info!(
        room,
        docname,
        removed = doc.references.len(),
        "compacted document"
    );
    Ok(CompactionOutcome::Compacted {
        removed: doc.references.len(),
    })
}
