//! DocumentStore trait definition.
//!
//! This trait abstracts over the concrete document store so the batching
//! engine can be compiled against a single interface and exercised with
//! in-memory doubles.

use rand::{distr::Alphanumeric, Rng};
use sync_core::Document;
use thiserror::Error;

/// Upper bound on the number of writes in one atomic commit.
pub const MAX_BATCH_WRITES: usize = 500;

/// Length of identifiers generated by [`auto_id`].
const AUTO_ID_LEN: usize = 20;

/// One document addressed for writing.
///
/// `id == None` asks the store to assign an identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentWrite {
    pub id: Option<String>,
    pub document: Document,
}

impl DocumentWrite {
    pub fn new(id: Option<String>, document: Document) -> Self {
        Self { id, document }
    }
}

/// The store rejected a write or could not be reached while writing.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The store answered and refused the request
    #[error("store rejected the request ({status}): {message}")]
    Rejected { status: String, message: String },

    /// The request never got a usable answer
    #[error("transport error: {0}")]
    Transport(String),

    /// Credentials could not be turned into an access token
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("batch of {size} writes exceeds the store limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },
}

/// Trait for writing documents to a document store.
///
/// # Usage Pattern
///
/// Writers use generics for zero-cost dispatch:
///
/// ```ignore
/// pub async fn write_all<S: DocumentStore>(store: &S, rows: Vec<Row>) -> Result<()> {
///     store.commit("products", &batch).await?;
/// }
/// ```
///
/// The CLI entry point branches once between the real store and the dry-run
/// store, and after that all code is monomorphized for that implementation.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Most writes a single [`DocumentStore::commit`] accepts.
    fn max_batch_size(&self) -> usize {
        MAX_BATCH_WRITES
    }

    /// Apply every write in `writes` to `collection` as one atomic unit.
    ///
    /// Each write fully replaces the addressed document. Either all writes
    /// are applied or the whole call fails.
    async fn commit(&self, collection: &str, writes: &[DocumentWrite]) -> Result<(), WriteError>;

    /// Write a single document.
    ///
    /// With `merge == false` the document is replaced; with `merge == true`
    /// only the fields present in `write.document` are changed.
    async fn set(
        &self,
        collection: &str,
        write: &DocumentWrite,
        merge: bool,
    ) -> Result<(), WriteError>;
}

/// Generate a random 20 character alphanumeric document identifier.
///
/// Used when a write carries no identifier and the store protocol needs one
/// up front (atomic commits address documents by full name).
pub fn auto_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(AUTO_ID_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_id_shape() {
        let id = auto_id();
        assert_eq!(id.len(), AUTO_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(auto_id(), auto_id());
    }

    #[test]
    fn test_write_error_display() {
        let err = WriteError::BatchTooLarge {
            size: 501,
            limit: MAX_BATCH_WRITES,
        };
        assert_eq!(
            err.to_string(),
            "batch of 501 writes exceeds the store limit of 500"
        );
    }
}
