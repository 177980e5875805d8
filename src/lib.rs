//! firestore-sync library
//!
//! Copies the results of SQL Server queries into Cloud Firestore
//! collections. Each configured transfer item runs one query; every row
//! becomes a document (decimals converted to doubles), keyed by an optional
//! key column, and documents are committed in atomic batches of up to 500
//! writes.
//!
//! # Crates
//!
//! - `sync_core` - rows, documents, value normalization, the `RowSource` trait
//! - `document_sink` - the `DocumentStore` trait plus in-memory and dry-run stores
//! - `firestore_sync_mssql_source` - SQL Server `RowSource` over tiberius
//! - `firestore_sink` - Cloud Firestore `DocumentStore` over the REST API
//!
//! # CLI Usage
//!
//! ```bash
//! # Run the transfers in settings.toml
//! firestore-sync
//!
//! # Use another settings file and only log what would be written
//! firestore-sync prod.toml --dry-run
//! ```
//!
//! # Example
//!
//! ```
//! use document_sink::MemoryStore;
//! use firestore_sync::config::{TransferItem, TransferRules};
//! use firestore_sync::{run_transfers, NoopObserver};
//! use sync_core::{Row, StaticRowSource};
//!
//! # tokio_test::block_on(async {
//! let mut source = StaticRowSource::new().with_result(
//!     "SELECT id FROM products",
//!     vec![Row::new().with("id", 1), Row::new().with("id", 2)],
//! );
//! let store = MemoryStore::new();
//! let rules = TransferRules {
//!     items: vec![TransferItem::new("SELECT id FROM products", "products").with_key("id")],
//!     ..Default::default()
//! };
//!
//! let report = run_transfers(&mut source, &store, &rules, &NoopObserver).await.unwrap();
//! assert_eq!(report.total_documents(), 2);
//! # });
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod progress;
pub mod sync;

pub use batch::{Batch, BatchWriter, WriteStats};
pub use config::{load_settings, Settings};
pub use error::SyncError;
pub use progress::{NoopObserver, ProgressBars, ProgressObserver};
pub use sync::{run_transfers, SyncReport, TransferReport};
