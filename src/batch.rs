//! Batch writer
//!
//! Turns rows into documents and hands them to a [`DocumentStore`], either
//! as atomic multi-document commits ([`BatchWriter::write_all`]) or one
//! write per document ([`BatchWriter::write_each`] and its concurrent
//! variant).

use crate::error::SyncError;
use crate::progress::{NoopObserver, ProgressObserver};
use document_sink::{DocumentStore, DocumentWrite, WriteError};
use futures::stream::{self, StreamExt};
use sync_core::{normalize, resolve_key, Row};

static NOOP: NoopObserver = NoopObserver;

/// The open batch of a collection transfer.
#[derive(Debug)]
pub struct Batch {
    writes: Vec<DocumentWrite>,
    capacity: usize,
}

impl Batch {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            writes: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a write; returns true once the batch is full.
    pub fn push(&mut self, write: DocumentWrite) -> bool {
        self.writes.push(write);
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.writes.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Hand out the pending writes and leave an empty batch behind.
    pub fn take(&mut self) -> Vec<DocumentWrite> {
        std::mem::replace(&mut self.writes, Vec::with_capacity(self.capacity))
    }
}

/// Counters for one collection transfer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriteStats {
    /// Documents the store accepted
    pub documents: usize,
    /// Successful multi-document commits
    pub commits: usize,
    /// Single-document writes the store refused
    pub failed: usize,
}

/// Writes the rows of one query into one collection.
pub struct BatchWriter<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    collection: &'a str,
    key_column: Option<&'a str>,
    capacity: usize,
    observer: &'a dyn ProgressObserver,
}

impl<'a, S: DocumentStore + ?Sized> BatchWriter<'a, S> {
    /// A writer committing batches as large as the store allows.
    pub fn new(store: &'a S, collection: &'a str, key_column: Option<&'a str>) -> Self {
        Self {
            store,
            collection,
            key_column,
            capacity: store.max_batch_size().max(1),
            observer: &NOOP,
        }
    }

    /// Limit batches to `capacity` writes, never above the store's limit.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.clamp(1, self.store.max_batch_size().max(1));
        self
    }

    pub fn with_observer(mut self, observer: &'a dyn ProgressObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn to_write(&self, row: &Row) -> DocumentWrite {
        DocumentWrite::new(resolve_key(row, self.key_column), normalize(row))
    }

    /// Commit every row in batches of at most `capacity` documents.
    ///
    /// Makes exactly `ceil(rows / capacity)` commits. The first failing
    /// commit ends the transfer; batches committed before it stay written.
    pub async fn write_all(&self, rows: &[Row]) -> Result<WriteStats, SyncError> {
        let mut batch = Batch::new(self.capacity);
        let mut stats = WriteStats::default();

        for row in rows {
            let full = batch.push(self.to_write(row));
            self.observer.on_document(self.collection);
            if full {
                tracing::debug!(
                    "Batch size reached ({}), committing batch for collection: {}",
                    batch.len(),
                    self.collection
                );
                self.commit(&mut batch, &mut stats).await?;
            }
        }

        if !batch.is_empty() {
            tracing::debug!(
                "Committing final batch of {} documents for collection: {}",
                batch.len(),
                self.collection
            );
            self.commit(&mut batch, &mut stats).await?;
        }

        Ok(stats)
    }

    async fn commit(&self, batch: &mut Batch, stats: &mut WriteStats) -> Result<(), SyncError> {
        let writes = batch.take();
        let ordinal = stats.commits + 1;
        self.store
            .commit(self.collection, &writes)
            .await
            .map_err(|source| SyncError::Commit {
                collection: self.collection.to_string(),
                batch: ordinal,
                documents: writes.len(),
                source,
            })?;
        stats.commits += 1;
        stats.documents += writes.len();
        Ok(())
    }

    /// Write documents one at a time, in row order.
    ///
    /// With `merge` the fields are merged into an existing document instead
    /// of replacing it. The first failure ends the transfer.
    pub async fn write_each(&self, rows: &[Row], merge: bool) -> Result<WriteStats, SyncError> {
        let mut stats = WriteStats::default();
        for row in rows {
            let write = self.to_write(row);
            if let Err(source) = self.store.set(self.collection, &write, merge).await {
                return Err(self.write_error(write, source));
            }
            self.observer.on_document(self.collection);
            stats.documents += 1;
        }
        Ok(stats)
    }

    /// Write documents one at a time with up to `workers` writes in flight.
    ///
    /// No ordering between documents. A failed write does not cancel the
    /// others: every write runs to completion before the result is decided,
    /// and the first failure (in completion order) is returned.
    pub async fn write_each_concurrent(
        &self,
        rows: &[Row],
        merge: bool,
        workers: usize,
    ) -> Result<WriteStats, SyncError> {
        let results: Vec<Result<(), SyncError>> = stream::iter(rows.iter().map(move |row| async move {
            let write = self.to_write(row);
            let result = match self.store.set(self.collection, &write, merge).await {
                Ok(()) => Ok(()),
                Err(source) => Err(self.write_error(write, source)),
            };
            self.observer.on_document(self.collection);
            result
        }))
        .buffer_unordered(workers.max(1))
        .collect()
        .await;

        let mut stats = WriteStats::default();
        let mut first_error = None;
        for result in results {
            match result {
                Ok(()) => stats.documents += 1,
                Err(e) => {
                    match std::error::Error::source(&e) {
                        Some(cause) => tracing::error!("{e}: {cause}"),
                        None => tracing::error!("{e}"),
                    }
                    stats.failed += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => {
                tracing::warn!(
                    "{} of {} writes into {} failed",
                    stats.failed,
                    rows.len(),
                    self.collection
                );
                Err(e)
            }
            None => Ok(stats),
        }
    }

    fn write_error(&self, write: DocumentWrite, source: WriteError) -> SyncError {
        SyncError::Write {
            collection: self.collection.to_string(),
            document: write.document.to_json_string(),
            key: write.id,
            source,
        }
    }
}
