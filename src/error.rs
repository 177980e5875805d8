//! Errors that end a sync run.

use document_sink::WriteError;
use std::path::PathBuf;
use sync_core::{ConnectionError, QueryError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The settings file is missing or fails validation
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Configuration error: failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `origin` is the settings file path, or `settings` for inline text
    #[error("Configuration error: invalid {origin}")]
    Parse {
        origin: String,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Only fatal under `on_query_error = "abort"`
    #[error(transparent)]
    Query(#[from] QueryError),

    /// An atomic multi-document commit failed; nothing in it was applied
    #[error("Error committing batch {batch} ({documents} documents) into {collection}")]
    Commit {
        collection: String,
        /// 1-based position of the batch within its collection transfer
        batch: usize,
        documents: usize,
        #[source]
        source: WriteError,
    },

    #[error(
        "Error updating doc {} in {collection}\nproperties: {document}",
        key.as_deref().unwrap_or("<auto>")
    )]
    Write {
        collection: String,
        key: Option<String>,
        /// Document content as JSON
        document: String,
        #[source]
        source: WriteError,
    },
}

impl SyncError {
    /// Collection the failure happened in, for write-side errors.
    pub fn collection(&self) -> Option<&str> {
        match self {
            SyncError::Commit { collection, .. } | SyncError::Write { collection, .. } => {
                Some(collection)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_commit_error_names_collection_and_batch() {
        let err = SyncError::Commit {
            collection: "products".into(),
            batch: 3,
            documents: 500,
            source: WriteError::Transport("connection reset".into()),
        };
        assert_eq!(
            err.to_string(),
            "Error committing batch 3 (500 documents) into products"
        );
        assert_eq!(err.collection(), Some("products"));
        assert_eq!(
            err.source().map(|s| s.to_string()),
            Some("transport error: connection reset".to_string())
        );
    }

    #[test]
    fn test_write_error_includes_key_and_document() {
        let err = SyncError::Write {
            collection: "products".into(),
            key: Some("7".into()),
            document: r#"{"id":7}"#.into(),
            source: WriteError::Auth("expired".into()),
        };
        let text = err.to_string();
        assert!(text.contains("doc 7 in products"));
        assert!(text.contains(r#"properties: {"id":7}"#));
    }

    #[test]
    fn test_query_error_is_transparent() {
        let err: SyncError = QueryError::new("SELECT 1", vec![]).into();
        assert!(err.to_string().starts_with("Error executing SQL:\nSELECT 1"));
        assert_eq!(err.collection(), None);
    }
}
