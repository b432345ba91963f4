//! Integration tests for the relational fragment store.
//!
//! Runs against an in-memory SQLite database so no server is needed. The pool is pinned
//! to a single connection because every SQLite `:memory:` connection is its own database.

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use yrs::updates::decoder::Decode;
use yrs::{Doc, GetString, StateVector, Text, Transact, WriteTxn};
use ystore_core::address::{document_prefix, encode_key};
use ystore_core::compaction::{CompactionOutcome, FragmentThreshold, compact};
use ystore_core::crdt;
use ystore_core::storage::{DocumentStorage, FragmentStorage, FragmentStore, StorageError};
use ystore_db::FragmentRepository;

/// Connect to a fresh in-memory database.
async fn connect() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    Database::connect(options)
        .await
        .expect("Failed to connect to sqlite")
}

/// Repository with the fragments table created.
async fn provisioned_repo() -> FragmentRepository {
    let repo = FragmentRepository::new(connect().await);
    repo.provision().await.expect("Failed to run migrations");
    repo
}

fn text_update(content: &str) -> Vec<u8> {
    let doc = Doc::new();
    {
        let mut txn = doc.transact_mut();
        let text = txn.get_or_insert_text("content");
        text.insert(&mut txn, 0, content);
    }
    crdt::encode_doc(&doc)
}

fn read_text(state: &[u8]) -> String {
    let doc = Doc::new();
    let mut txn = doc.transact_mut();
    txn.apply_update(crdt::decode_update(state).expect("decodes"))
        .expect("applies");
    let text = txn.get_or_insert_text("content");
    text.get_string(&txn)
}

// ============================================================================
// Raw fragment store
// ============================================================================

#[tokio::test]
async fn test_put_get_roundtrip() {
    let repo = provisioned_repo().await;
    let key = encode_key("team/a", "notes 1", "f1");

    repo.put(&key, vec![1, 2, 3]).await.expect("put");
    let blob = repo.get(&key).await.expect("get");

    assert_eq!(blob, Some(vec![1, 2, 3]));
}

#[tokio::test]
async fn test_get_missing_is_none() {
    let repo = provisioned_repo().await;
    let blob = repo
        .get(&encode_key("r", "d", "missing"))
        .await
        .expect("get");
    assert!(blob.is_none());
}

#[tokio::test]
async fn test_list_is_scoped_to_document() {
    let repo = provisioned_repo().await;
    repo.put(&encode_key("r", "d", "1"), vec![1])
        .await
        .expect("put");
    repo.put(&encode_key("r", "d", "2"), vec![2])
        .await
        .expect("put");
    repo.put(&encode_key("r", "other", "3"), vec![3])
        .await
        .expect("put");
    repo.put(&encode_key("r2", "d", "4"), vec![4])
        .await
        .expect("put");

    let mut keys = repo.list(&document_prefix("r", "d")).await.expect("list");
    keys.sort();

    assert_eq!(keys, vec![encode_key("r", "d", "1"), encode_key("r", "d", "2")]);
}

#[tokio::test]
async fn test_list_reencodes_special_characters() {
    let repo = provisioned_repo().await;
    let key = encode_key("team/a", "notes 1", "f1");
    repo.put(&key, vec![9]).await.expect("put");

    let keys = repo
        .list(&document_prefix("team/a", "notes 1"))
        .await
        .expect("list");

    assert_eq!(keys, vec![key]);
}

#[tokio::test]
async fn test_delete_missing_succeeds() {
    let repo = provisioned_repo().await;
    let key = encode_key("r", "d", "1");
    repo.put(&key, vec![1]).await.expect("put");

    repo.delete(&key).await.expect("delete");
    repo.delete(&key).await.expect("second delete");

    assert!(repo.get(&key).await.expect("get").is_none());
}

#[tokio::test]
async fn test_put_rejects_key_without_fragment() {
    let repo = provisioned_repo().await;
    let err = repo
        .put(&document_prefix("r", "d"), vec![1])
        .await
        .expect_err("prefix is not a fragment key");
    assert!(matches!(err, StorageError::MalformedKey { .. }));
}

#[tokio::test]
async fn test_provision_twice_succeeds() {
    let repo = provisioned_repo().await;
    let storage = FragmentStorage::new(repo);
    storage.provision().await.expect("second provision");
}

#[tokio::test]
async fn test_unprovisioned_table_is_backend_error() {
    let repo = FragmentRepository::new(connect().await);
    let err = repo
        .get(&encode_key("r", "d", "1"))
        .await
        .expect_err("table is missing");
    assert!(matches!(
        err,
        StorageError::BackendUnavailable {
            backend: "relational",
            ..
        }
    ));
}

// ============================================================================
// Document storage over the relational backend
// ============================================================================

#[tokio::test]
async fn test_single_fragment_roundtrip() {
    let storage = FragmentStorage::new(provisioned_repo().await);
    storage
        .persist_doc("room1", "doc1", &text_update("hello"))
        .await
        .expect("persist");

    let doc = storage
        .retrieve_doc("room1", "doc1")
        .await
        .expect("retrieve")
        .expect("doc exists");

    assert_eq!(doc.references.len(), 1);
    assert_eq!(read_text(&doc.state), "hello");
}

#[tokio::test]
async fn test_missing_doc_is_none() {
    let storage = FragmentStorage::new(provisioned_repo().await);
    let doc = storage.retrieve_doc("room1", "nope").await.expect("retrieve");
    assert!(doc.is_none());
    let sv = storage
        .retrieve_state_vector("room1", "nope")
        .await
        .expect("state vector");
    assert!(sv.is_none());
}

#[tokio::test]
async fn test_merge_then_delete_references() {
    let storage = FragmentStorage::new(provisioned_repo().await);
    for content in ["a", "b", "c"] {
        storage
            .persist_doc("room1", "doc1", &text_update(content))
            .await
            .expect("persist");
    }

    let doc = storage
        .retrieve_doc("room1", "doc1")
        .await
        .expect("retrieve")
        .expect("doc exists");
    assert_eq!(doc.references.len(), 3);
    let text = read_text(&doc.state);
    for content in ["a", "b", "c"] {
        assert!(text.contains(content));
    }

    storage
        .delete_references("room1", "doc1", &doc.references)
        .await
        .expect("delete");
    let after = storage.retrieve_doc("room1", "doc1").await.expect("retrieve");
    assert!(after.is_none());
}

#[tokio::test]
async fn test_state_vector_matches_merged_state() {
    let storage = FragmentStorage::new(provisioned_repo().await);
    storage
        .persist_doc("room1", "doc1", &text_update("abc"))
        .await
        .expect("persist");

    let doc = storage
        .retrieve_doc("room1", "doc1")
        .await
        .expect("retrieve")
        .expect("doc exists");
    let sv = storage
        .retrieve_state_vector("room1", "doc1")
        .await
        .expect("state vector")
        .expect("doc exists");

    let expected = crdt::state_vector(&doc.state).expect("state vector");
    assert_eq!(
        StateVector::decode_v1(&sv).expect("decodes"),
        StateVector::decode_v1(&expected).expect("decodes")
    );
}

#[tokio::test]
async fn test_compaction_keeps_late_fragment() {
    let storage = FragmentStorage::new(provisioned_repo().await);
    storage
        .persist_doc("room1", "doc1", &text_update("a"))
        .await
        .expect("persist");
    storage
        .persist_doc("room1", "doc1", &text_update("b"))
        .await
        .expect("persist");
    let doc = storage
        .retrieve_doc("room1", "doc1")
        .await
        .expect("retrieve")
        .expect("doc exists");

    storage
        .persist_doc("room1", "doc1", &text_update("late"))
        .await
        .expect("persist");
    let outcome = compact(&storage, "room1", "doc1", &doc, &FragmentThreshold::new(2))
        .await
        .expect("compact");
    assert_eq!(outcome, CompactionOutcome::Compacted { removed: 2 });

    let after = storage
        .retrieve_doc("room1", "doc1")
        .await
        .expect("retrieve")
        .expect("doc exists");
    assert_eq!(after.references.len(), 2);
    let text = read_text(&after.state);
    assert!(text.contains("late"));
    assert!(text.contains('a'));
    assert!(text.contains('b'));
}

#[tokio::test]
async fn test_empty_names_rejected() {
    let storage = FragmentStorage::new(provisioned_repo().await);
    storage
        .persist_doc("room1", "doc1", &text_update("kept"))
        .await
        .expect("persist");
    let existing = storage
        .retrieve_doc("room1", "doc1")
        .await
        .expect("retrieve")
        .expect("doc exists")
        .references;

    for (room, docname) in [("", "doc1"), ("room1", ""), ("", "")] {
        let err = storage
            .persist_doc(room, docname, &text_update("lost"))
            .await
            .expect_err("empty name persist");
        assert!(matches!(err, StorageError::EmptyName { .. }), "{err}");

        let err = storage
            .retrieve_doc(room, docname)
            .await
            .expect_err("empty name retrieve");
        assert!(matches!(err, StorageError::EmptyName { .. }), "{err}");

        let err = storage
            .delete_references(room, docname, &existing)
            .await
            .expect_err("empty name delete");
        assert!(matches!(err, StorageError::EmptyName { .. }), "{err}");
    }

    let keys = storage
        .backend()
        .list(&document_prefix("room1", "doc1"))
        .await
        .expect("list");
    assert_eq!(keys.len(), 1);
}

#[tokio::test]
async fn test_destroy_is_idempotent() {
    let storage = FragmentStorage::new(provisioned_repo().await);
    storage.destroy().await.expect("destroy");
    storage.destroy().await.expect("second destroy");
}
