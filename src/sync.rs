//! Synchronization driver
//!
//! Runs every transfer item in configuration order: query the relational
//! source, then write the rows into the item's collection with the item's
//! write mode. Items are independent; there is no rollback of earlier items
//! when a later one fails.

use crate::batch::{BatchWriter, WriteStats};
use crate::config::{QueryErrorPolicy, TransferItem, TransferRules, WriteMode};
use crate::error::SyncError;
use crate::progress::ProgressObserver;
use document_sink::DocumentStore;
use sync_core::RowSource;

/// Outcome of one transfer item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    pub collection: String,
    pub rows: usize,
    pub documents: usize,
    pub commits: usize,
    /// The query failed and the item was skipped
    pub query_failed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub items: Vec<TransferReport>,
}

impl SyncReport {
    pub fn total_documents(&self) -> usize {
        self.items.iter().map(|i| i.documents).sum()
    }

    pub fn skipped(&self) -> impl Iterator<Item = &TransferReport> {
        self.items.iter().filter(|i| i.query_failed)
    }
}

/// Run every item of `rules` against `source` and `store`.
///
/// Returns at the first commit or write failure. Query failures skip the
/// item unless `on_query_error = "abort"`.
pub async fn run_transfers<R, S>(
    source: &mut R,
    store: &S,
    rules: &TransferRules,
    observer: &dyn ProgressObserver,
) -> Result<SyncReport, SyncError>
where
    R: RowSource + ?Sized,
    S: DocumentStore + ?Sized,
{
    let mut report = SyncReport::default();

    for item in &rules.items {
        let item_report = run_transfer(source, store, rules, item, observer).await?;
        report.items.push(item_report);
    }

    tracing::info!(
        "Completed {} transfers: {} documents written",
        report.items.len(),
        report.total_documents()
    );
    Ok(report)
}

async fn run_transfer<R, S>(
    source: &mut R,
    store: &S,
    rules: &TransferRules,
    item: &TransferItem,
    observer: &dyn ProgressObserver,
) -> Result<TransferReport, SyncError>
where
    R: RowSource + ?Sized,
    S: DocumentStore + ?Sized,
{
    tracing::info!("Starting transfer into collection '{}'", item.name);

    let (rows, query_failed) = match source.query(&item.sql_script).await {
        Ok(rows) => (rows, false),
        Err(e) => match rules.on_query_error {
            QueryErrorPolicy::Skip => {
                tracing::warn!("{e}");
                tracing::warn!("Skipping collection '{}'", item.name);
                (Vec::new(), true)
            }
            QueryErrorPolicy::Abort => return Err(e.into()),
        },
    };

    let plan = rules.plan(item);
    let writer = BatchWriter::new(store, &item.name, item.key_id.as_deref())
        .with_capacity(plan.batch_size)
        .with_observer(observer);

    observer.on_transfer_start(&item.name, rows.len());
    let written = match plan.write_mode {
        WriteMode::Batch => writer.write_all(&rows).await,
        WriteMode::Each => writer.write_each(&rows, plan.merge).await,
        WriteMode::Concurrent => {
            writer
                .write_each_concurrent(&rows, plan.merge, plan.concurrency)
                .await
        }
    };
    let stats: WriteStats = match written {
        Ok(stats) => stats,
        Err(e) => {
            observer.on_transfer_failed(&item.name);
            return Err(e);
        }
    };
    observer.on_transfer_finish(&item.name);

    tracing::info!(
        "Completed transfer into collection '{}': {} documents",
        item.name,
        stats.documents
    );
    Ok(TransferReport {
        collection: item.name.clone(),
        rows: rows.len(),
        documents: stats.documents,
        commits: stats.commits,
        query_failed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopObserver;
    use document_sink::MemoryStore;
    use std::sync::Mutex;
    use sync_core::{Row, StaticRowSource};

    #[derive(Default)]
    struct EventLog(Mutex<Vec<String>>);

    impl EventLog {
        fn push(&self, event: String) {
            self.0.lock().unwrap().push(event);
        }

        fn events(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    impl ProgressObserver for EventLog {
        fn on_transfer_start(&self, collection: &str, rows: usize) {
            self.push(format!("start {collection} {rows}"));
        }

        fn on_transfer_finish(&self, collection: &str) {
            self.push(format!("finish {collection}"));
        }

        fn on_transfer_failed(&self, collection: &str) {
            self.push(format!("failed {collection}"));
        }
    }

    fn rules(items: Vec<TransferItem>) -> TransferRules {
        TransferRules {
            items,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_items_run_in_order() {
        let mut source = StaticRowSource::new()
            .with_result("SELECT a", vec![Row::new().with("id", 1)])
            .with_result("SELECT b", vec![Row::new().with("id", 2)]);
        let store = MemoryStore::new();
        let rules = rules(vec![
            TransferItem::new("SELECT a", "a").with_key("id"),
            TransferItem::new("SELECT b", "b").with_key("id"),
        ]);

        let report = run_transfers(&mut source, &store, &rules, &NoopObserver)
            .await
            .unwrap();

        assert_eq!(source.executed(), ["SELECT a", "SELECT b"]);
        assert_eq!(report.items.len(), 2);
        assert_eq!(report.total_documents(), 2);
        let collections: Vec<String> = store
            .commits()
            .await
            .into_iter()
            .map(|c| c.collection)
            .collect();
        assert_eq!(collections, ["a", "b"]);
    }

    #[tokio::test]
    async fn test_query_error_skips_item() {
        let mut source =
            StaticRowSource::new().with_result("SELECT b", vec![Row::new().with("id", 2)]);
        let store = MemoryStore::new();
        let rules = rules(vec![
            TransferItem::new("SELECT missing", "a").with_key("id"),
            TransferItem::new("SELECT b", "b").with_key("id"),
        ]);

        let report = run_transfers(&mut source, &store, &rules, &NoopObserver)
            .await
            .unwrap();

        assert!(report.items[0].query_failed);
        assert_eq!(report.items[0].documents, 0);
        assert_eq!(report.skipped().count(), 1);
        assert_eq!(store.documents("b").await.len(), 1);
        assert_eq!(store.commit_attempts().await, 1);
    }

    #[tokio::test]
    async fn test_query_error_aborts_when_configured() {
        let mut source =
            StaticRowSource::new().with_result("SELECT b", vec![Row::new().with("id", 2)]);
        let store = MemoryStore::new();
        let mut rules = rules(vec![
            TransferItem::new("SELECT missing", "a"),
            TransferItem::new("SELECT b", "b"),
        ]);
        rules.on_query_error = QueryErrorPolicy::Abort;

        let err = run_transfers(&mut source, &store, &rules, &NoopObserver)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Query(_)));
        assert_eq!(source.executed(), ["SELECT missing"]);
        assert_eq!(store.commit_attempts().await, 0);
    }

    #[tokio::test]
    async fn test_write_failure_reports_failed_transfer() {
        let rows: Vec<Row> = (1..=6).map(|i| Row::new().with("id", i)).collect();
        let mut source = StaticRowSource::new().with_result("SELECT a", rows);
        let store = MemoryStore::new().fail_commit(2);
        let mut rules = rules(vec![TransferItem::new("SELECT a", "a").with_key("id")]);
        rules.batch_size = 2;
        let log = EventLog::default();

        let err = run_transfers(&mut source, &store, &rules, &log)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Commit { batch: 2, .. }));
        assert_eq!(log.events(), ["start a 6", "failed a"]);
    }
}
