//! End-to-end transfer tests
//!
//! Drive the whole pipeline (settings, driver, batch writer) against an
//! in-memory row source and document store.

use document_sink::{DocumentStore, MemoryStore};
use firestore_sync::config::{Settings, TransferItem, TransferRules, WriteMode};
use firestore_sync::{run_transfers, NoopObserver, ProgressObserver, SyncError};
use std::sync::atomic::{AtomicUsize, Ordering};
use sync_core::{DocumentValue, Row, SqlValue, StaticRowSource};

const PRODUCTS_SQL: &str = "SELECT id, amount FROM products ORDER BY id";

fn dec(s: &str) -> SqlValue {
    SqlValue::Decimal(s.parse().unwrap())
}

fn product_rows() -> Vec<Row> {
    vec![
        Row::new().with("id", 1).with("amount", dec("9.50")),
        Row::new().with("id", 2).with("amount", dec("3.25")),
    ]
}

fn products_source() -> StaticRowSource {
    StaticRowSource::new().with_result(PRODUCTS_SQL, product_rows())
}

#[tokio::test]
async fn test_capacity_one_commits_each_document() {
    let settings = Settings::from_toml(&format!(
        r#"
[ms_sql_server]
server = "localhost"
user = "sa"
database = "shop"

[cloud_firestore]
emulator_host = "localhost:8080"
project_id = "demo"

[transfer_rules]
batch_size = 1

[[transfer_rules.items]]
sql_script = "{PRODUCTS_SQL}"
name = "products"
key_id = "id"
"#
    ))
    .unwrap();

    let mut source = products_source();
    let store = MemoryStore::new();
    let report = run_transfers(&mut source, &store, &settings.transfer_rules, &NoopObserver)
        .await
        .unwrap();

    assert_eq!(report.items[0].commits, 2);
    assert_eq!(store.commits().await.len(), 2);

    let docs = store.documents("products").await;
    assert_eq!(docs.len(), 2);
    assert_eq!(docs["1"].get("id"), Some(&DocumentValue::Integer(1)));
    assert_eq!(docs["1"].get("amount"), Some(&DocumentValue::Double(9.5)));
    assert_eq!(docs["2"].get("id"), Some(&DocumentValue::Integer(2)));
    assert_eq!(docs["2"].get("amount"), Some(&DocumentValue::Double(3.25)));
}

#[tokio::test]
async fn test_unset_key_gets_store_assigned_ids() {
    let mut source = products_source();
    let store = MemoryStore::new();
    let rules = TransferRules {
        items: vec![TransferItem::new(PRODUCTS_SQL, "products")],
        ..Default::default()
    };

    run_transfers(&mut source, &store, &rules, &NoopObserver)
        .await
        .unwrap();

    let docs = store.documents("products").await;
    assert_eq!(docs.len(), 2);
    assert!(docs.keys().all(|id| id.len() == 20 && id != "1" && id != "2"));
    let mut amounts: Vec<f64> = docs
        .values()
        .filter_map(|d| d.get("amount").and_then(DocumentValue::as_f64))
        .collect();
    amounts.sort_by(|a, b| a.total_cmp(b));
    assert_eq!(amounts, [3.25, 9.5]);
}

#[tokio::test]
async fn test_empty_key_column_is_unset() {
    let mut source = products_source();
    let store = MemoryStore::new();
    let rules = TransferRules {
        items: vec![TransferItem::new(PRODUCTS_SQL, "products").with_key("")],
        ..Default::default()
    };

    run_transfers(&mut source, &store, &rules, &NoopObserver)
        .await
        .unwrap();

    let docs = store.documents("products").await;
    assert!(docs.keys().all(|id| id.len() == 20));
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let store = MemoryStore::new();
    let rules = TransferRules {
        items: vec![TransferItem::new(PRODUCTS_SQL, "products").with_key("id")],
        ..Default::default()
    };

    run_transfers(&mut products_source(), &store, &rules, &NoopObserver)
        .await
        .unwrap();
    let first = store.documents("products").await;

    run_transfers(&mut products_source(), &store, &rules, &NoopObserver)
        .await
        .unwrap();
    let second = store.documents("products").await;

    assert_eq!(first, second);
    assert_eq!(store.commits().await.len(), 2);
}

#[tokio::test]
async fn test_commit_failure_stops_the_run() {
    let rows: Vec<Row> = (1..=10).map(|i| Row::new().with("id", i)).collect();
    let mut source = StaticRowSource::new()
        .with_result("SELECT a", rows)
        .with_result("SELECT b", vec![Row::new().with("id", 1)]);
    let store = MemoryStore::new().fail_commit(2);
    let mut rules = TransferRules {
        items: vec![
            TransferItem::new("SELECT a", "first").with_key("id"),
            TransferItem::new("SELECT b", "second").with_key("id"),
        ],
        ..Default::default()
    };
    rules.batch_size = 4;

    let err = run_transfers(&mut source, &store, &rules, &NoopObserver)
        .await
        .unwrap_err();

    assert_eq!(err.collection(), Some("first"));
    assert!(err.to_string().contains("first"));
    assert!(matches!(err, SyncError::Commit { batch: 2, .. }));
    // batch 1 stays written, batch 3 and the second item never run
    assert_eq!(store.documents("first").await.len(), 4);
    assert_eq!(store.commit_attempts().await, 2);
    assert!(store.documents("second").await.is_empty());
    assert_eq!(source.executed(), ["SELECT a"]);
}

#[tokio::test]
async fn test_write_modes_produce_same_documents() {
    let rows: Vec<Row> = (1..=25)
        .map(|i| Row::new().with("id", i).with("amount", dec("0.10")))
        .collect();

    let mut expected = None;
    for mode in [WriteMode::Batch, WriteMode::Each, WriteMode::Concurrent] {
        let mut source = StaticRowSource::new().with_result("SELECT x", rows.clone());
        let store = MemoryStore::new();
        let mut item = TransferItem::new("SELECT x", "things").with_key("id");
        item.write_mode = Some(mode);
        let rules = TransferRules {
            items: vec![item],
            concurrency: 4,
            ..Default::default()
        };

        let report = run_transfers(&mut source, &store, &rules, &NoopObserver)
            .await
            .unwrap();
        assert_eq!(report.items[0].documents, 25, "{mode:?}");

        let docs = store.documents("things").await;
        match &expected {
            None => expected = Some(docs),
            Some(expected) => assert_eq!(expected, &docs, "{mode:?}"),
        }
    }
}

#[tokio::test]
async fn test_concurrent_failure_is_reported_after_all_writes() {
    let rows: Vec<Row> = (1..=50).map(|i| Row::new().with("id", i)).collect();
    let mut source = StaticRowSource::new().with_result("SELECT x", rows);
    let store = MemoryStore::new().fail_id("10").fail_id("40");
    let mut item = TransferItem::new("SELECT x", "things").with_key("id");
    item.write_mode = Some(WriteMode::Concurrent);
    let rules = TransferRules {
        items: vec![item],
        concurrency: 16,
        ..Default::default()
    };

    let err = run_transfers(&mut source, &store, &rules, &NoopObserver)
        .await
        .unwrap_err();

    match err {
        SyncError::Write { ref key, .. } => {
            assert!(matches!(key.as_deref(), Some("10") | Some("40")));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(store.set_count().await, 48);
}

#[derive(Default)]
struct Recording {
    started: AtomicUsize,
    documents: AtomicUsize,
    finished: AtomicUsize,
}

impl ProgressObserver for Recording {
    fn on_transfer_start(&self, _collection: &str, _rows: usize) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn on_document(&self, _collection: &str) {
        self.documents.fetch_add(1, Ordering::SeqCst);
    }

    fn on_transfer_finish(&self, _collection: &str) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_observer_sees_every_document() {
    let mut source = products_source();
    let store = MemoryStore::new();
    let observer = Recording::default();
    let rules = TransferRules {
        items: vec![
            TransferItem::new(PRODUCTS_SQL, "products").with_key("id"),
            TransferItem::new("SELECT missing", "missing"),
        ],
        ..Default::default()
    };

    run_transfers(&mut source, &store, &rules, &observer)
        .await
        .unwrap();

    assert_eq!(observer.started.load(Ordering::SeqCst), 2);
    assert_eq!(observer.documents.load(Ordering::SeqCst), 2);
    assert_eq!(observer.finished.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_store_limit_caps_configured_batch_size() {
    let rows: Vec<Row> = (1..=7).map(|i| Row::new().with("id", i)).collect();
    let mut source = StaticRowSource::new().with_result("SELECT x", rows);
    let store = MemoryStore::new().with_max_batch_size(3);
    let rules = TransferRules {
        items: vec![TransferItem::new("SELECT x", "things").with_key("id")],
        ..Default::default()
    };

    let report = run_transfers(&mut source, &store, &rules, &NoopObserver)
        .await
        .unwrap();

    assert_eq!(store.max_batch_size(), 3);
    assert_eq!(report.items[0].commits, 3);
}
