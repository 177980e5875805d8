//! In-memory document store.
//!
//! Keeps collections in process memory and records every commit, which makes
//! it the store of choice for tests of the batching engine. Failures can be
//! injected per commit ordinal or per document id.

use crate::traits::{auto_id, DocumentStore, DocumentWrite, WriteError, MAX_BATCH_WRITES};
use std::collections::{BTreeMap, HashMap, HashSet};
use sync_core::Document;
use tokio::sync::Mutex;

/// What a single successful commit contained.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitRecord {
    pub collection: String,
    /// Document ids in write order, after auto-assignment
    pub ids: Vec<String>,
}

#[derive(Default)]
struct State {
    collections: HashMap<String, BTreeMap<String, Document>>,
    commits: Vec<CommitRecord>,
    commit_attempts: usize,
    sets: usize,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    max_batch_size: Option<usize>,
    fail_commits: HashSet<usize>,
    fail_ids: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the per-commit write limit.
    pub fn with_max_batch_size(mut self, limit: usize) -> Self {
        self.max_batch_size = Some(limit);
        self
    }

    /// Reject the `n`-th commit attempt (1-based) without applying it.
    pub fn fail_commit(mut self, n: usize) -> Self {
        self.fail_commits.insert(n);
        self
    }

    /// Reject any single-document write addressed to `id`.
    pub fn fail_id(mut self, id: impl Into<String>) -> Self {
        self.fail_ids.insert(id.into());
        self
    }

    /// Snapshot of one collection, keyed by document id.
    pub async fn documents(&self, collection: &str) -> BTreeMap<String, Document> {
        self.state
            .lock()
            .await
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Successful commits, in order.
    pub async fn commits(&self) -> Vec<CommitRecord> {
        self.state.lock().await.commits.clone()
    }

    /// Commit attempts, successful or not.
    pub async fn commit_attempts(&self) -> usize {
        self.state.lock().await.commit_attempts
    }

    /// Successful single-document writes.
    pub async fn set_count(&self) -> usize {
        self.state.lock().await.sets
    }
}

fn apply(
    docs: &mut BTreeMap<String, Document>,
    id: String,
    document: &Document,
    merge: bool,
) {
    match docs.get_mut(&id) {
        Some(existing) if merge => existing.merge(document),
        _ => {
            docs.insert(id, document.clone());
        }
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    fn max_batch_size(&self) -> usize {
        self.max_batch_size.unwrap_or(MAX_BATCH_WRITES)
    }

    async fn commit(&self, collection: &str, writes: &[DocumentWrite]) -> Result<(), WriteError> {
        let mut state = self.state.lock().await;
        state.commit_attempts += 1;

        let limit = self.max_batch_size();
        if writes.len() > limit {
            return Err(WriteError::BatchTooLarge {
                size: writes.len(),
                limit,
            });
        }
        if self.fail_commits.contains(&state.commit_attempts) {
            return Err(WriteError::Rejected {
                status: "ABORTED".to_string(),
                message: format!("injected failure on commit {}", state.commit_attempts),
            });
        }

        let ids: Vec<String> = writes
            .iter()
            .map(|w| w.id.clone().unwrap_or_else(auto_id))
            .collect();

        let docs = state
            .collections
            .entry(collection.to_string())
            .or_default();
        for (id, write) in ids.iter().zip(writes) {
            apply(docs, id.clone(), &write.document, false);
        }

        state.commits.push(CommitRecord {
            collection: collection.to_string(),
            ids,
        });
        Ok(())
    }

    async fn set(
        &self,
        collection: &str,
        write: &DocumentWrite,
        merge: bool,
    ) -> Result<(), WriteError> {
        if let Some(id) = &write.id {
            if self.fail_ids.contains(id) {
                return Err(WriteError::Rejected {
                    status: "INVALID_ARGUMENT".to_string(),
                    message: format!("injected failure for document {id}"),
                });
            }
        }

        let mut state = self.state.lock().await;
        let id = write.id.clone().unwrap_or_else(auto_id);
        let docs = state
            .collections
            .entry(collection.to_string())
            .or_default();
        apply(docs, id, &write.document, merge);
        state.sets += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_core::DocumentValue;

    fn doc(n: i64) -> Document {
        Document::new().with("n", DocumentValue::Integer(n))
    }

    #[tokio::test]
    async fn test_commit_applies_all_writes() {
        let store = MemoryStore::new();
        let writes = vec![
            DocumentWrite::new(Some("a".into()), doc(1)),
            DocumentWrite::new(Some("b".into()), doc(2)),
        ];
        store.commit("things", &writes).await.unwrap();

        let docs = store.documents("things").await;
        assert_eq!(docs.len(), 2);
        assert_eq!(docs["a"], doc(1));
        assert_eq!(store.commits().await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_commit_applies_nothing() {
        let store = MemoryStore::new().fail_commit(1);
        let writes = vec![DocumentWrite::new(Some("a".into()), doc(1))];

        assert!(store.commit("things", &writes).await.is_err());
        assert!(store.documents("things").await.is_empty());
        assert_eq!(store.commit_attempts().await, 1);
        assert!(store.commits().await.is_empty());
    }

    #[tokio::test]
    async fn test_commit_over_limit_is_rejected() {
        let store = MemoryStore::new().with_max_batch_size(1);
        let writes = vec![
            DocumentWrite::new(None, doc(1)),
            DocumentWrite::new(None, doc(2)),
        ];
        let err = store.commit("things", &writes).await.unwrap_err();
        assert!(matches!(err, WriteError::BatchTooLarge { size: 2, limit: 1 }));
    }

    #[tokio::test]
    async fn test_missing_ids_are_assigned() {
        let store = MemoryStore::new();
        let writes = vec![
            DocumentWrite::new(None, doc(1)),
            DocumentWrite::new(None, doc(2)),
        ];
        store.commit("things", &writes).await.unwrap();

        let commits = store.commits().await;
        assert_eq!(commits[0].ids.len(), 2);
        assert_ne!(commits[0].ids[0], commits[0].ids[1]);
        assert_eq!(store.documents("things").await.len(), 2);
    }

    #[tokio::test]
    async fn test_set_merge_keeps_other_fields() {
        let store = MemoryStore::new();
        let full = Document::new()
            .with("a", DocumentValue::Integer(1))
            .with("b", DocumentValue::Integer(2));
        let patch = Document::new().with("b", DocumentValue::Integer(3));

        store
            .set("things", &DocumentWrite::new(Some("x".into()), full), false)
            .await
            .unwrap();
        store
            .set("things", &DocumentWrite::new(Some("x".into()), patch.clone()), true)
            .await
            .unwrap();
        let docs = store.documents("things").await;
        assert_eq!(docs["x"].get("a"), Some(&DocumentValue::Integer(1)));
        assert_eq!(docs["x"].get("b"), Some(&DocumentValue::Integer(3)));

        store
            .set("things", &DocumentWrite::new(Some("x".into()), patch), false)
            .await
            .unwrap();
        let docs = store.documents("things").await;
        assert_eq!(docs["x"].get("a"), None);
        assert_eq!(store.set_count().await, 3);
    }

    #[tokio::test]
    async fn test_set_failure_injection() {
        let store = MemoryStore::new().fail_id("bad");
        let err = store
            .set("things", &DocumentWrite::new(Some("bad".into()), doc(1)), false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("bad"));
        assert_eq!(store.set_count().await, 0);
    }
}
