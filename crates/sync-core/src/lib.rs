//! Core types for firestore-sync.
//!
//! This crate provides the types shared by every other crate in the
//! workspace:
//!
//! - [`SqlValue`] / [`Row`] - what a relational source yields
//! - [`DocumentValue`] / [`Document`] - what a document store accepts
//! - [`normalize`] / [`resolve_key`] - the pure row → document conversion
//! - [`RowSource`] - the query seam, with its error types
//!
//! # Architecture
//!
//! ```text
//! sync-core (this crate)
//!    │
//!    ├─── mssql-source     (implements RowSource for SQL Server)
//!    ├─── document-sink    (DocumentStore trait, in-memory store)
//!    └─── firestore-sink   (implements DocumentStore for Firestore)
//! ```
//!
//! # Example
//!
//! ```rust
//! use rust_decimal::Decimal;
//! use sync_core::{normalize, resolve_key, DocumentValue, Row};
//!
//! let row = Row::new()
//!     .with("id", 1i64)
//!     .with("amount", Decimal::new(950, 2));
//!
//! let doc = normalize(&row);
//! assert_eq!(doc.get("amount"), Some(&DocumentValue::Double(9.5)));
//! assert_eq!(resolve_key(&row, Some("id")).as_deref(), Some("1"));
//! ```

pub mod document;
pub mod row;
pub mod source;
pub mod values;

pub use document::{decimal_to_f64, normalize, normalize_value, resolve_key, Document};
pub use row::Row;
pub use source::{ConnectionError, ErrorDetail, QueryError, RowSource, StaticRowSource};
pub use values::{DocumentValue, SqlValue};
