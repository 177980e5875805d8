//! Value representations on both sides of the sync.
//!
//! [`SqlValue`] is what a relational row source yields for a single cell.
//! [`DocumentValue`] is what a document store accepts for a single field.
//! The two differ only in that a document value never carries an
//! arbitrary-precision decimal.

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use uuid::Uuid;

/// A scalar read from a relational backend.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// Any integer column (tinyint through bigint)
    Int(i64),

    /// real / float columns
    Float(f64),

    /// decimal / numeric columns, kept at full precision
    Decimal(Decimal),

    /// Character data of any width
    String(String),

    /// bit columns
    Bool(bool),

    /// Any date/time column, normalized to UTC
    DateTime(DateTime<Utc>),

    /// uniqueidentifier columns
    Uuid(Uuid),

    /// binary / varbinary / image columns
    Bytes(Vec<u8>),

    /// SQL NULL
    Null,
}

impl SqlValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Canonical string form used for document identifiers.
    ///
    /// Returns `None` for null. Decimals keep their scale (`9.50` stays
    /// `9.50`), floats always show a fraction or exponent (`1.0`, `1e+21`),
    /// timestamps use RFC 3339 with a `Z` suffix and binary data is base64
    /// encoded.
    pub fn to_key_string(&self) -> Option<String> {
        match self {
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(float_key_string(*f)),
            Self::Decimal(d) => Some(d.to_string()),
            Self::String(s) => Some(s.clone()),
            Self::Bool(b) => Some(b.to_string()),
            Self::DateTime(dt) => Some(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::Uuid(u) => Some(u.hyphenated().to_string()),
            Self::Bytes(b) => Some(general_purpose::STANDARD.encode(b)),
            Self::Null => None,
        }
    }
}

/// Shortest round-trip form of `f`, written as `1.0` or `2.5` between
/// 1e-4 and 1e16 and as `1e+21` or `1.5e-05` outside that range.
fn float_key_string(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let scientific = format!("{f:e}");
    let (mantissa, exponent) = scientific
        .split_once('e')
        .unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if f == 0.0 || (-4..16).contains(&exponent) {
        let fixed = f.to_string();
        if fixed.contains('.') {
            fixed
        } else {
            format!("{fixed}.0")
        }
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exponent.abs())
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        Self::Int(value as i64)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Decimal> for SqlValue {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::DateTime(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// A scalar accepted by the document store.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentValue {
    Integer(i64),
    Double(f64),
    String(String),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Bytes(Vec<u8>),
    Null,
}

impl DocumentValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

// Serialized as plain JSON scalars for diagnostics and dry-run output. The
// store's own wire encoding lives in the sink crate.
impl Serialize for DocumentValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Double(f) => serializer.serialize_f64(*f),
            Self::String(s) => serializer.serialize_str(s),
            Self::Boolean(b) => serializer.serialize_bool(*b),
            Self::Timestamp(dt) => {
                serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Self::Bytes(b) => serializer.serialize_str(&general_purpose::STANDARD.encode(b)),
            Self::Null => serializer.serialize_unit(),
        }
    }
}
