//! Settings file loading and validation.
//!
//! ```toml
//! [relational_source]
//! server = "sql.example.com"
//! user = "sync"
//! password = "secret"
//! database = "shop"
//!
//! [document_store]
//! private_key_file = "service-account.json"
//!
//! [transfer_rules]
//! batch_size = 500
//!
//! [[transfer_rules.items]]
//! sql_script = "SELECT id, amount FROM products"
//! name = "products"
//! key_id = "id"
//! ```

use crate::error::SyncError;
use document_sink::MAX_BATCH_WRITES;
use firestore_sink::FirestoreOpts;
use firestore_sync_mssql_source::MssqlOpts;
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_BATCH_SIZE: usize = MAX_BATCH_WRITES;
pub const DEFAULT_CONCURRENCY: usize = 16;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(alias = "ms_sql_server")]
    pub relational_source: MssqlOpts,
    #[serde(alias = "cloud_firestore", default)]
    pub document_store: FirestoreOpts,
    pub transfer_rules: TransferRules,
}

/// How documents of a transfer reach the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Atomic multi-document commits of up to `batch_size` writes
    #[default]
    Batch,
    /// One write per document, in row order
    Each,
    /// One write per document, up to `concurrency` in flight
    Concurrent,
}

/// What to do when an item's query fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryErrorPolicy {
    /// Log the error and transfer no rows for that item
    #[default]
    Skip,
    /// Stop the run
    Abort,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferRules {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub write_mode: WriteMode,
    /// Set-with-merge for `each` and `concurrent` writes
    #[serde(default)]
    pub merge: bool,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub on_query_error: QueryErrorPolicy,
    #[serde(default)]
    pub items: Vec<TransferItem>,
}

impl Default for TransferRules {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            write_mode: WriteMode::default(),
            merge: false,
            concurrency: DEFAULT_CONCURRENCY,
            on_query_error: QueryErrorPolicy::default(),
            items: Vec::new(),
        }
    }
}

/// One query and the collection its rows go to.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferItem {
    pub sql_script: String,
    /// Destination collection
    pub name: String,
    /// Column whose value becomes the document id
    #[serde(default)]
    pub key_id: Option<String>,
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub write_mode: Option<WriteMode>,
    #[serde(default)]
    pub merge: Option<bool>,
}

impl TransferItem {
    pub fn new(sql_script: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            sql_script: sql_script.into(),
            name: name.into(),
            key_id: None,
            batch_size: None,
            write_mode: None,
            merge: None,
        }
    }

    pub fn with_key(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }
}

/// Effective write settings of one item after applying its overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemPlan {
    pub batch_size: usize,
    pub write_mode: WriteMode,
    pub merge: bool,
    pub concurrency: usize,
}

impl TransferRules {
    pub fn plan(&self, item: &TransferItem) -> ItemPlan {
        ItemPlan {
            batch_size: item.batch_size.unwrap_or(self.batch_size),
            write_mode: item.write_mode.unwrap_or(self.write_mode),
            merge: item.merge.unwrap_or(self.merge),
            concurrency: self.concurrency,
        }
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.items.is_empty() {
            return Err(SyncError::Configuration(
                "transfer_rules.items must list at least one item".to_string(),
            ));
        }
        check_batch_size("transfer_rules.batch_size", self.batch_size)?;
        if self.concurrency == 0 {
            return Err(SyncError::Configuration(
                "transfer_rules.concurrency must be at least 1".to_string(),
            ));
        }
        for (i, item) in self.items.iter().enumerate() {
            if item.name.trim().is_empty() {
                return Err(SyncError::Configuration(format!(
                    "transfer_rules.items[{i}]: name must not be empty"
                )));
            }
            if let Some(size) = item.batch_size {
                check_batch_size(&format!("transfer_rules.items[{i}].batch_size"), size)?;
            }
        }
        Ok(())
    }
}

fn check_batch_size(field: &str, size: usize) -> Result<(), SyncError> {
    if size == 0 || size > MAX_BATCH_WRITES {
        return Err(SyncError::Configuration(format!(
            "{field} must be between 1 and {MAX_BATCH_WRITES}, got {size}"
        )));
    }
    Ok(())
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

impl Settings {
    pub fn from_toml(text: &str) -> Result<Self, SyncError> {
        Self::parse(text, "settings")
    }

    fn parse(text: &str, origin: &str) -> Result<Self, SyncError> {
        let settings: Settings = toml::from_str(text).map_err(|source| SyncError::Parse {
            origin: origin.to_string(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        self.transfer_rules.validate()
    }
}

/// Read and validate a settings file.
pub fn load_settings(path: &Path) -> Result<Settings, SyncError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SyncError::Configuration(format!(
                "File {} not found.",
                path.display()
            )));
        }
        Err(source) => {
            return Err(SyncError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let origin = path.display().to_string();
    Settings::parse(&text, &origin).map_err(|e| match e {
        SyncError::Configuration(msg) => SyncError::Configuration(format!("{origin}: {msg}")),
        other => other,
    })
}
