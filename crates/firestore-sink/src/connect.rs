use crate::sink_impl::FirestoreSink;
use document_sink::WriteError;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use sync_core::ConnectionError;

const FIRESTORE_ENDPOINT: &str = "https://firestore.googleapis.com/v1/";
const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
const DEFAULT_DATABASE: &str = "(default)";
/// Environment variable honoured by every Firestore client library.
pub const EMULATOR_HOST_ENV: &str = "FIRESTORE_EMULATOR_HOST";

/// Firestore connection options.
#[derive(Clone, Debug, Deserialize)]
pub struct FirestoreOpts {
    /// Service-account key file (JSON)
    #[serde(default)]
    pub private_key_file: Option<PathBuf>,
    /// Overrides the project of the service account
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_database")]
    pub database: String,
    /// `host:port` of a Firestore emulator; disables authentication
    #[serde(default)]
    pub emulator_host: Option<String>,
}

fn default_database() -> String {
    DEFAULT_DATABASE.to_string()
}

impl Default for FirestoreOpts {
    fn default() -> Self {
        Self {
            private_key_file: None,
            project_id: None,
            database: default_database(),
            emulator_host: None,
        }
    }
}

impl FirestoreOpts {
    /// Fill `emulator_host` from `FIRESTORE_EMULATOR_HOST` when unset.
    pub fn with_env_emulator(mut self) -> Self {
        if self.emulator_host.is_none() {
            self.emulator_host = std::env::var(EMULATOR_HOST_ENV)
                .ok()
                .filter(|h| !h.is_empty());
        }
        self
    }
}

/// How requests are authorized.
#[derive(Clone)]
pub(crate) enum Auth {
    ServiceAccount(Arc<dyn TokenProvider>),
    /// The emulator accepts this fixed token as an admin credential.
    Emulator,
}

impl Auth {
    pub(crate) async fn bearer(&self) -> Result<String, WriteError> {
        match self {
            Auth::ServiceAccount(provider) => provider
                .token(&[DATASTORE_SCOPE])
                .await
                .map(|token| token.as_str().to_string())
                .map_err(|e| WriteError::Auth(e.to_string())),
            Auth::Emulator => Ok("owner".to_string()),
        }
    }
}

/// Build a Firestore client from `opts`.
///
/// Loads the service-account key and fetches a first access token, so bad
/// credentials surface here rather than on the first commit.
pub async fn firestore_connect(opts: &FirestoreOpts) -> Result<FirestoreSink, ConnectionError> {
    let target = "Cloud Firestore";

    if let Some(host) = &opts.emulator_host {
        let project_id = opts
            .project_id
            .clone()
            .or_else(|| key_file_project(opts))
            .ok_or_else(|| {
                ConnectionError::message(target, "project_id is required with the emulator")
            })?;
        tracing::info!("Using Firestore emulator at {host} (project: {project_id})");
        let base = format!("http://{host}/v1/");
        return Ok(FirestoreSink::new(base, &project_id, &opts.database, Auth::Emulator));
    }

    let key_file = opts.private_key_file.as_ref().ok_or_else(|| {
        ConnectionError::message(target, "private_key_file is required")
    })?;

    let account = CustomServiceAccount::from_file(key_file).map_err(|e| {
        ConnectionError::message(
            target,
            format!("failed to load credentials from {}: {e}", key_file.display()),
        )
    })?;
    let provider: Arc<dyn TokenProvider> = Arc::new(account);

    let project_id = match &opts.project_id {
        Some(id) => id.clone(),
        None => provider
            .project_id()
            .await
            .map(|id| id.to_string())
            .map_err(|e| ConnectionError::message(target, format!("no project id: {e}")))?,
    };

    let auth = Auth::ServiceAccount(provider);
    auth.bearer()
        .await
        .map_err(|e| ConnectionError::message(target, e.to_string()))?;

    tracing::info!("Connected to Cloud Firestore (project: {project_id})");
    Ok(FirestoreSink::new(
        FIRESTORE_ENDPOINT.to_string(),
        &project_id,
        &opts.database,
        auth,
    ))
}

#[derive(Deserialize)]
struct KeyFileProject {
    project_id: Option<String>,
}

/// Read `project_id` straight from the key file, if one is configured.
fn key_file_project(opts: &FirestoreOpts) -> Option<String> {
    let path = opts.private_key_file.as_ref()?;
    let text = std::fs::read_to_string(path).ok()?;
    serde_json::from_str::<KeyFileProject>(&text).ok()?.project_id
}
