//! Thin wrapper over `yrs` for the merge and state-vector operations storage needs.
//!
//! Fragments are Yjs updates in the v2 encoding. State vectors are emitted in the v1
//! encoding, which is what sync handshakes exchange.

use yrs::updates::decoder::Decode;
use yrs::updates::encoder::Encode;
use yrs::{Doc, ReadTxn, StateVector, Transact, Update};

use crate::storage::StorageError;

/// Decode a single v2 update.
pub fn decode_update(bytes: &[u8]) -> Result<Update, StorageError> {
    Update::decode_v2(bytes).map_err(|e| StorageError::crdt(e.to_string()))
}

/// Merge decoded updates into a single v2 update.
///
/// Order does not matter and duplicates are absorbed.
pub fn merge(updates: impl IntoIterator<Item = Update>) -> Result<Vec<u8>, StorageError> {
    let doc = Doc::new();
    {
        let mut txn = doc.transact_mut();
        for update in updates {
            txn.apply_update(update)
                .map_err(|e| StorageError::crdt(e.to_string()))?;
        }
    }
    Ok(encode_doc(&doc))
}

/// Decode and merge raw v2 updates.
pub fn merge_updates<T: AsRef<[u8]>>(updates: &[T]) -> Result<Vec<u8>, StorageError> {
    let decoded = updates
        .iter()
        .map(|u| decode_update(u.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    merge(decoded)
}

/// State vector (v1) of a merged v2 state.
pub fn state_vector(state: &[u8]) -> Result<Vec<u8>, StorageError> {
    let update = decode_update(state)?;
    let doc = Doc::new();
    let mut txn = doc.transact_mut();
    txn.apply_update(update)
        .map_err(|e| StorageError::crdt(e.to_string()))?;
    Ok(txn.state_vector().encode_v1())
}

/// Full state of a live document as a v2 update.
#[must_use]
pub fn encode_doc(doc: &Doc) -> Vec<u8> {
    doc.transact()
        .encode_state_as_update_v2(&StateVector::default())
}
