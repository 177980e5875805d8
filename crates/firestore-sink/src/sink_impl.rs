//! Implementation of DocumentStore for Cloud Firestore.

use crate::connect::Auth;
use crate::encode::encode_write;
use document_sink::{auto_id, DocumentStore, DocumentWrite, WriteError};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

/// Firestore client writing through the REST `documents:commit` endpoint.
///
/// Every write, batched or not, is a commit: a batch maps to one commit with
/// many writes, a single `set` to one commit with one write.
#[derive(Clone)]
pub struct FirestoreSink {
    http: reqwest::Client,
    auth: Auth,
    commit_url: String,
    documents_root: String,
}

impl FirestoreSink {
    pub(crate) fn new(base_url: String, project_id: &str, database: &str, auth: Auth) -> Self {
        let database_path = format!("projects/{project_id}/databases/{database}");
        Self {
            http: reqwest::Client::new(),
            auth,
            commit_url: format!("{base_url}{database_path}/documents:commit"),
            documents_root: format!("{database_path}/documents"),
        }
    }

    /// `projects/{project}/databases/{database}/documents`
    pub fn documents_root(&self) -> &str {
        &self.documents_root
    }

    pub fn commit_url(&self) -> &str {
        &self.commit_url
    }

    /// Full resource name for a document; a missing id gets a fresh random one.
    pub fn document_name(&self, collection: &str, id: Option<&str>) -> String {
        match id {
            Some(id) => format!("{}/{collection}/{id}", self.documents_root),
            None => format!("{}/{collection}/{}", self.documents_root, auto_id()),
        }
    }

    async fn send_commit(&self, writes: Vec<Value>) -> Result<(), WriteError> {
        let token = self.auth.bearer().await?;
        let response = self
            .http
            .post(&self.commit_url)
            .bearer_auth(token)
            .json(&json!({ "writes": writes }))
            .send()
            .await
            .map_err(|e| WriteError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(rejection(status, &body))
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
}

/// Turn a non-2xx response into a [`WriteError`], preferring the structured
/// `{"error": {"status", "message"}}` body Google APIs return.
pub(crate) fn rejection(status: reqwest::StatusCode, body: &str) -> WriteError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => WriteError::Rejected {
            status: if envelope.error.status.is_empty() {
                status.to_string()
            } else {
                envelope.error.status
            },
            message: envelope.error.message,
        },
        Err(_) => WriteError::Rejected {
            status: status.to_string(),
            message: body.trim().to_string(),
        },
    }
}

#[async_trait::async_trait]
impl DocumentStore for FirestoreSink {
    async fn commit(&self, collection: &str, writes: &[DocumentWrite]) -> Result<(), WriteError> {
        let limit = self.max_batch_size();
        if writes.len() > limit {
            return Err(WriteError::BatchTooLarge {
                size: writes.len(),
                limit,
            });
        }

        let encoded = writes
            .iter()
            .map(|w| encode_write(&self.document_name(collection, w.id.as_deref()), w, false))
            .collect();
        debug!("Committing {} writes to {}", writes.len(), collection);
        self.send_commit(encoded).await
    }

    async fn set(
        &self,
        collection: &str,
        write: &DocumentWrite,
        merge: bool,
    ) -> Result<(), WriteError> {
        let name = self.document_name(collection, write.id.as_deref());
        self.send_commit(vec![encode_write(&name, write, merge)])
            .await
    }
}
