//! SQL Server row source for firestore-sync.
//!
//! Opens a single TDS connection with `tiberius` and implements
//! [`sync_core::RowSource`] on top of it.
//!
//! # Structure
//!
//! - `source`: connection options, connect/query, backend error collection
//! - `reverse`: convert SQL Server column data → `SqlValue`
//!
//! # Example
//!
//! ```rust,ignore
//! use firestore_sync_mssql_source::{MssqlOpts, MssqlSource};
//! use sync_core::RowSource;
//!
//! let mut source = MssqlSource::connect(&opts).await?;
//! let rows = source.query("SELECT id, price FROM products").await?;
//! ```

pub mod reverse;
mod source;

pub use reverse::{column_data_to_value, convert_row, ConversionError};
pub use source::{MssqlOpts, MssqlSource};
