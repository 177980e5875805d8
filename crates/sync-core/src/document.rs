//! Row → document conversion.
//!
//! [`normalize`] turns a [`Row`] into a [`Document`] and [`resolve_key`]
//! derives the document identifier. Both are pure functions.

use crate::row::Row;
use crate::values::{DocumentValue, SqlValue};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// A document ready to be written to the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Document {
    fields: BTreeMap<String, DocumentValue>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: DocumentValue) {
        self.fields.insert(field.into(), value);
    }

    pub fn with(mut self, field: impl Into<String>, value: DocumentValue) -> Self {
        self.insert(field, value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&DocumentValue> {
        self.fields.get(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DocumentValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Merge `other` into this document, overwriting fields present in both.
    pub fn merge(&mut self, other: &Document) {
        for (k, v) in &other.fields {
            self.fields.insert(k.clone(), v.clone());
        }
    }

    /// Render the document as compact JSON for diagnostics.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self.fields))
    }
}

impl FromIterator<(String, DocumentValue)> for Document {
    fn from_iter<T: IntoIterator<Item = (String, DocumentValue)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Convert a decimal to the nearest representable `f64`.
///
/// Goes through the exact decimal string so the result is correctly rounded
/// (`str::parse::<f64>` rounds to nearest, ties to even).
pub fn decimal_to_f64(d: &Decimal) -> f64 {
    d.to_string()
        .parse::<f64>()
        .ok()
        .or_else(|| d.to_f64())
        .unwrap_or(f64::NAN)
}

/// Convert a single source value into a document value.
pub fn normalize_value(value: &SqlValue) -> DocumentValue {
    match value {
        SqlValue::Decimal(d) => DocumentValue::Double(decimal_to_f64(d)),
        SqlValue::Int(i) => DocumentValue::Integer(*i),
        SqlValue::Float(f) => DocumentValue::Double(*f),
        SqlValue::String(s) => DocumentValue::String(s.clone()),
        SqlValue::Bool(b) => DocumentValue::Boolean(*b),
        SqlValue::DateTime(dt) => DocumentValue::Timestamp(*dt),
        SqlValue::Uuid(u) => DocumentValue::String(u.hyphenated().to_string()),
        SqlValue::Bytes(b) => DocumentValue::Bytes(b.clone()),
        SqlValue::Null => DocumentValue::Null,
    }
}

/// Convert a row into a document.
///
/// Decimal values become doubles; every other value keeps its type.
pub fn normalize(row: &Row) -> Document {
    row.iter()
        .map(|(column, value)| (column.to_string(), normalize_value(value)))
        .collect()
}

/// Derive the document identifier for `row`.
///
/// Returns `None` when `key_column` is unset or empty, when the row has no
/// such column, or when its value is null. The store assigns an identifier
/// in that case.
pub fn resolve_key(row: &Row, key_column: Option<&str>) -> Option<String> {
    let column = key_column.filter(|c| !c.is_empty())?;
    row.get(column).and_then(SqlValue::to_key_string)
}
