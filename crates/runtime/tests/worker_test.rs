//! Integration tests for backend selection and the worker loop.

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use yrs::{Doc, GetString, Text, Transact, WriteTxn};
use ystore_core::compaction::{FragmentThreshold, Never};
use ystore_core::crdt;
use ystore_core::storage::{DocumentStorage, FragmentStorage, ObjectStore};
use ystore_runtime::{
    StartupError, Storage, UpdateCallback, Worker, WorkerTask, open_storage, task_queue,
};
use ystore_shared::AppConfig;

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

fn memory_storage() -> Arc<FragmentStorage<ObjectStore>> {
    Arc::new(FragmentStorage::new(
        ObjectStore::memory().expect("memory store"),
    ))
}

fn sqlite_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = Some("sqlite::memory:".to_string());
    config.database.max_connections = 1;
    config.database.min_connections = 1;
    config
}

async fn mock_callback(status: u16) -> (MockServer, UpdateCallback) {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    let callback = UpdateCallback::new(
        Some(&format!("{}/updates", server.uri())),
        Duration::from_secs(5),
    )
    .expect("valid callback url");
    (server, callback)
}

// ============================================================================
// Backend selection
// ============================================================================

#[tokio::test]
async fn test_default_config_opens_memory_store() {
    let storage = open_storage(&AppConfig::default())
        .await
        .expect("memory store opens");
    assert!(matches!(storage, Storage::ObjectStore(_)));
    assert_eq!(storage.name(), "memory");

    storage
        .persist_doc("r1", "d1", &text_update("hello"))
        .await
        .expect("persist");
    let doc = storage
        .retrieve_doc("r1", "d1")
        .await
        .expect("retrieve")
        .expect("doc exists");
    assert_eq!(read_text(&doc.state), "hello");
}

#[tokio::test]
async fn test_relational_store_opens_and_reprovisions() {
    let storage = open_storage(&sqlite_config())
        .await
        .expect("sqlite store opens");
    assert_eq!(storage.name(), "relational");

    let Storage::Relational(inner) = &storage else {
        panic!("expected relational storage");
    };
    // Existing table: a second provisioning pass must not fail.
    inner.provision().await.expect("second provision");

    storage
        .persist_doc("r1", "d1", &text_update("a"))
        .await
        .expect("persist");
    storage
        .persist_doc("r1", "d1", &text_update("b"))
        .await
        .expect("persist");
    let doc = storage
        .retrieve_doc("r1", "d1")
        .await
        .expect("retrieve")
        .expect("doc exists");
    assert_eq!(doc.references.len(), 2);

    storage.destroy().await.expect("destroy");
    storage.destroy().await.expect("second destroy");
}

#[tokio::test]
async fn test_unreachable_database_aborts_startup() {
    let mut config = AppConfig::default();
    config.database.url = Some("sqlite:///nonexistent-dir/ydocs.db?mode=ro".to_string());

    let err = open_storage(&config)
        .await
        .expect_err("startup must abort");
    assert!(matches!(err, StartupError::Database(_)));
}

// ============================================================================
// Worker loop
// ============================================================================

#[tokio::test]
async fn test_worker_delivers_merged_state() {
    let (server, callback) = mock_callback(200).await;
    let storage = memory_storage();
    storage
        .persist_doc("r1", "d1", &text_update("hello"))
        .await
        .expect("persist");

    let (tx, rx) = task_queue(8);
    let worker = Worker::new(Arc::clone(&storage), callback, Arc::new(Never));
    tx.send(WorkerTask::new("r1", "d1")).await.expect("send");
    drop(tx);
    worker.run(rx).await;

    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url.path(), "/updates/r1");
}

#[tokio::test]
async fn test_worker_rejected_delivery_keeps_document() {
    let (server, callback) = mock_callback(500).await;
    let storage = memory_storage();
    storage
        .persist_doc("r1", "d1", &text_update("hello"))
        .await
        .expect("persist");

    let (tx, rx) = task_queue(8);
    let worker = Worker::new(Arc::clone(&storage), callback, Arc::new(Never));
    tx.send(WorkerTask::new("r1", "d1")).await.expect("send");
    drop(tx);
    worker.run(rx).await;

    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 1);
    let doc = storage
        .retrieve_doc("r1", "d1")
        .await
        .expect("retrieve")
        .expect("document survives a failed delivery");
    assert_eq!(read_text(&doc.state), "hello");
}

#[tokio::test]
async fn test_worker_compacts_over_threshold() {
    let storage = memory_storage();
    for content in ["a", "b", "c"] {
        storage
            .persist_doc("r1", "d1", &text_update(content))
            .await
            .expect("persist");
    }

    let (tx, rx) = task_queue(8);
    let worker = Worker::new(
        Arc::clone(&storage),
        UpdateCallback::disabled(),
        Arc::new(FragmentThreshold::new(3)),
    );
    tx.send(WorkerTask::new("r1", "d1")).await.expect("send");
    drop(tx);
    worker.run(rx).await;

    let doc = storage
        .retrieve_doc("r1", "d1")
        .await
        .expect("retrieve")
        .expect("doc exists");
    assert_eq!(doc.references.len(), 1);
    let text = read_text(&doc.state);
    for content in ["a", "b", "c"] {
        assert!(text.contains(content));
    }
}

#[tokio::test]
async fn test_worker_handles_rooms_independently() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/updates/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/updates/fast"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let callback = UpdateCallback::new(
        Some(&format!("{}/updates", server.uri())),
        Duration::from_millis(500),
    )
    .expect("valid callback url");

    let storage = memory_storage();
    for room in ["slow", "fast", "missing-doc-room"] {
        if room != "missing-doc-room" {
            storage
                .persist_doc(room, "d1", &text_update(room))
                .await
                .expect("persist");
        }
    }

    let (tx, rx) = task_queue(8);
    let worker = Worker::new(Arc::clone(&storage), callback, Arc::new(Never));
    for room in ["slow", "fast", "missing-doc-room"] {
        tx.send(WorkerTask::new(room, "d1")).await.expect("send");
    }
    drop(tx);

    // The slow room times out; the fast one is still delivered and the missing
    // document is skipped without a request.
    tokio::time::timeout(Duration::from_secs(5), worker.run(rx))
        .await
        .expect("worker finishes once the slow delivery times out");

    let requests = server.received_requests().await.expect("recording enabled");
    let mut paths: Vec<_> = requests.iter().map(|r| r.url.path().to_string()).collect();
    paths.sort();
    assert_eq!(paths, vec!["/updates/fast", "/updates/slow"]);
}

#[tokio::test]
async fn test_worker_stops_on_shutdown() {
    let storage = memory_storage();
    let (tx, rx) = task_queue(8);
    let worker = Worker::new(storage, UpdateCallback::disabled(), Arc::new(Never));
    let shutdown = worker.shutdown_token();

    let handle = tokio::spawn(worker.run(rx));
    shutdown.cancel();

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("worker stops")
        .expect("worker task does not panic");
    drop(tx);
}
