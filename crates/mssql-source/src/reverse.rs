//! Reverse conversion: SQL Server column data → `SqlValue`
//!
//! Converts the values of a tiberius [`Row`] into a sync-core [`Row`],
//! keeping the backend's column order and names.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use sync_core::{Row, SqlValue};
use thiserror::Error;
use tiberius::numeric::Numeric;
use tiberius::{ColumnData, FromSql};

/// Error during SQL Server value conversion.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Column '{column}': {source}")]
    Decode {
        column: String,
        #[source]
        source: tiberius::error::Error,
    },
    #[error("Column '{column}': invalid date/time value")]
    InvalidDateTime { column: String },
}

/// Convert a tiberius row into a sync-core row.
pub fn convert_row(row: tiberius::Row) -> Result<Row, ConversionError> {
    let names: Vec<String> = row
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    let mut out = Row::new();
    for (name, data) in names.into_iter().zip(row) {
        let value = column_data_to_value(&name, data)?;
        out.push(name, value);
    }
    Ok(out)
}

/// Convert a single column value.
pub fn column_data_to_value(
    column: &str,
    data: ColumnData<'static>,
) -> Result<SqlValue, ConversionError> {
    let value = match data {
        ColumnData::U8(v) => v.map(|i| i as i64).into(),
        ColumnData::I16(v) => v.map(|i| i as i64).into(),
        ColumnData::I32(v) => v.map(|i| i as i64).into(),
        ColumnData::I64(v) => v.into(),
        ColumnData::F32(v) => v.map(|f| f as f64).into(),
        ColumnData::F64(v) => v.into(),
        ColumnData::Bit(v) => v.into(),
        ColumnData::String(v) => v.map(|s| s.into_owned()).into(),
        ColumnData::Guid(v) => v.map_or(SqlValue::Null, SqlValue::Uuid),
        ColumnData::Binary(v) => v.map_or(SqlValue::Null, |b| SqlValue::Bytes(b.into_owned())),
        ColumnData::Numeric(v) => v.map_or(SqlValue::Null, numeric_to_value),
        ColumnData::Xml(v) => v.map(|x| x.into_owned().into_string()).into(),
        ref temporal @ (ColumnData::DateTime(_)
        | ColumnData::SmallDateTime(_)
        | ColumnData::DateTime2(_)) => {
            decode::<NaiveDateTime>(column, temporal)?.map_or(SqlValue::Null, |dt| {
                SqlValue::DateTime(dt.and_utc())
            })
        }
        ref offset @ ColumnData::DateTimeOffset(_) => decode::<DateTime<FixedOffset>>(column, offset)?
            .map_or(SqlValue::Null, |dt| {
                SqlValue::DateTime(dt.with_timezone(&Utc))
            }),
        ref date @ ColumnData::Date(_) => match decode::<NaiveDate>(column, date)? {
            Some(d) => {
                let midnight = d
                    .and_hms_opt(0, 0, 0)
                    .ok_or_else(|| ConversionError::InvalidDateTime {
                        column: column.to_string(),
                    })?;
                SqlValue::DateTime(midnight.and_utc())
            }
            None => SqlValue::Null,
        },
        ref time @ ColumnData::Time(_) => decode::<NaiveTime>(column, time)?
            .map(|t| t.format("%H:%M:%S%.f").to_string())
            .into(),
    };
    Ok(value)
}

fn decode<'a, T: FromSql<'a>>(
    column: &str,
    data: &'a ColumnData<'static>,
) -> Result<Option<T>, ConversionError> {
    T::from_sql(data).map_err(|source| ConversionError::Decode {
        column: column.to_string(),
        source,
    })
}

/// Numerics that fit a 96-bit mantissa keep full precision; wider ones
/// (precision above 28) fall back to the nearest double.
fn numeric_to_value(n: Numeric) -> SqlValue {
    match Decimal::try_from_i128_with_scale(n.value(), n.scale() as u32) {
        Ok(d) => SqlValue::Decimal(d),
        Err(_) => SqlValue::Float(f64::from(n)),
    }
}
