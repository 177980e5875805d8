//! Store that logs writes instead of performing them.

use crate::traits::{DocumentStore, DocumentWrite, WriteError};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

/// Accepts every write and only logs it.
#[derive(Debug, Default)]
pub struct DryRunStore {
    documents: AtomicUsize,
}

impl DryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Documents that would have been written so far.
    pub fn documents(&self) -> usize {
        self.documents.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl DocumentStore for DryRunStore {
    async fn commit(&self, collection: &str, writes: &[DocumentWrite]) -> Result<(), WriteError> {
        info!(
            "Dry-run: Would commit {} documents into {}",
            writes.len(),
            collection
        );
        for write in writes {
            debug!(
                "Dry-run: {}/{} {}",
                collection,
                write.id.as_deref().unwrap_or("<auto>"),
                write.document.to_json_string()
            );
        }
        self.documents.fetch_add(writes.len(), Ordering::Relaxed);
        Ok(())
    }

    async fn set(
        &self,
        collection: &str,
        write: &DocumentWrite,
        merge: bool,
    ) -> Result<(), WriteError> {
        debug!(
            "Dry-run: Would set {}/{} (merge: {}) {}",
            collection,
            write.id.as_deref().unwrap_or("<auto>"),
            merge,
            write.document.to_json_string()
        );
        self.documents.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
