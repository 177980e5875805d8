//! Document → Firestore REST JSON encoding.
//!
//! Firestore's JSON mapping wraps every value in a single-key object naming
//! its type (`{"integerValue": "1"}`, `{"doubleValue": 9.5}`, ...). 64-bit
//! integers travel as strings.

use base64::{engine::general_purpose, Engine as _};
use chrono::SecondsFormat;
use document_sink::DocumentWrite;
use serde_json::{json, Map, Value};
use sync_core::{Document, DocumentValue};

/// Encode a single field value.
pub fn encode_value(value: &DocumentValue) -> Value {
    match value {
        DocumentValue::Integer(i) => json!({ "integerValue": i.to_string() }),
        DocumentValue::Double(f) => json!({ "doubleValue": encode_double(*f) }),
        DocumentValue::String(s) => json!({ "stringValue": s }),
        DocumentValue::Boolean(b) => json!({ "booleanValue": b }),
        DocumentValue::Timestamp(dt) => json!({
            "timestampValue": dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
        }),
        DocumentValue::Bytes(b) => json!({ "bytesValue": general_purpose::STANDARD.encode(b) }),
        DocumentValue::Null => json!({ "nullValue": null }),
    }
}

// JSON has no literal for non-finite numbers; the proto3 mapping uses strings.
fn encode_double(f: f64) -> Value {
    if f.is_nan() {
        Value::from("NaN")
    } else if f == f64::INFINITY {
        Value::from("Infinity")
    } else if f == f64::NEG_INFINITY {
        Value::from("-Infinity")
    } else {
        Value::from(f)
    }
}

/// Encode the fields of a document.
pub fn encode_fields(document: &Document) -> Map<String, Value> {
    document
        .iter()
        .map(|(k, v)| (k.to_string(), encode_value(v)))
        .collect()
}

/// Quote a top-level field name for use in an update mask.
///
/// Names made of letters, digits and underscores (not starting with a digit)
/// are used as-is, anything else is wrapped in backticks.
pub fn field_path(name: &str) -> String {
    let simple = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        name.to_string()
    } else {
        let escaped = name.replace('\\', "\\\\").replace('`', "\\`");
        format!("`{escaped}`")
    }
}

/// Build one entry of a `documents:commit` request.
///
/// `name` is the full resource name of the target document. With `merge`
/// the write carries an update mask listing the document's fields, so other
/// fields of an existing document survive.
pub fn encode_write(name: &str, write: &DocumentWrite, merge: bool) -> Value {
    let mut entry = json!({
        "update": {
            "name": name,
            "fields": encode_fields(&write.document),
        }
    });
    if merge {
        let paths: Vec<String> = write.document.field_names().map(field_path).collect();
        entry["updateMask"] = json!({ "fieldPaths": paths });
    }
    entry
}
