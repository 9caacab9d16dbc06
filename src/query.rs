use std::error::Error;
use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use postgres::types::{FromSql, Kind, Type};
use rust_decimal::Decimal;
use serde_json::Value;
use uuid::Uuid;

use crate::config::RowMode;
use crate::error::{PgScopeError, describe};
use crate::results::{Columns, Row};
use crate::types::RowValues;

/// Shape raw driver rows into [`Row`]s sharing one column list.
///
/// # Errors
/// Returns `PgScopeError::QueryError` if a column cannot be decoded.
pub fn build_rows(rows: &[postgres::Row], mode: RowMode) -> Result<Vec<Row>, PgScopeError> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let columns = Arc::new(Columns::new(
        first
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect(),
    ));

    let mut shaped = Vec::with_capacity(rows.len());
    for row in rows {
        shaped.push(build_row(row, mode, &columns)?);
    }
    Ok(shaped)
}

pub(crate) fn build_row(
    row: &postgres::Row,
    mode: RowMode,
    columns: &Arc<Columns>,
) -> Result<Row, PgScopeError> {
    let col_count = row.columns().len();
    let mut values = Vec::with_capacity(col_count);
    for idx in 0..col_count {
        values.push(postgres_extract_value(row, idx)?);
    }
    Ok(Row::shape(mode, columns, values))
}

/// Label of a user-defined enum value; the binary form is the label itself.
struct EnumLabel(String);

impl<'a> FromSql<'a> for EnumLabel {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(EnumLabel(std::str::from_utf8(raw)?.to_owned()))
    }

    fn accepts(ty: &Type) -> bool {
        matches!(ty.kind(), Kind::Enum(_))
    }
}

/// Extracts a `RowValues` from a driver row at the given index.
///
/// Types without a native mapping (interval, money, geometric, arrays, ...)
/// are refused; cast them to `text` in the query to read them.
///
/// # Errors
/// Returns `PgScopeError::QueryError` if the column cannot be decoded or its
/// type has no mapping.
pub fn postgres_extract_value(row: &postgres::Row, idx: usize) -> Result<RowValues, PgScopeError> {
    let decode_err = |e: postgres::Error| {
        PgScopeError::query(format!(
            "cannot decode column {:?}: {}",
            row.columns()[idx].name(),
            describe(&e)
        ))
    };
    let ty = row.columns()[idx].type_().clone();

    let value = match ty {
        Type::INT2 => row
            .try_get::<_, Option<i16>>(idx)
            .map_err(decode_err)?
            .map(|v| RowValues::Int(i64::from(v))),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(idx)
            .map_err(decode_err)?
            .map(|v| RowValues::Int(i64::from(v))),
        Type::INT8 => row
            .try_get::<_, Option<i64>>(idx)
            .map_err(decode_err)?
            .map(RowValues::Int),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)
            .map_err(decode_err)?
            .map(|v| RowValues::Float(f64::from(v))),
        Type::FLOAT8 => row
            .try_get::<_, Option<f64>>(idx)
            .map_err(decode_err)?
            .map(RowValues::Float),
        Type::NUMERIC => row
            .try_get::<_, Option<Decimal>>(idx)
            .map_err(decode_err)?
            .map(RowValues::Numeric),
        Type::OID => row
            .try_get::<_, Option<u32>>(idx)
            .map_err(decode_err)?
            .map(|v| RowValues::Int(i64::from(v))),
        Type::BOOL => row
            .try_get::<_, Option<bool>>(idx)
            .map_err(decode_err)?
            .map(RowValues::Bool),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)
            .map_err(decode_err)?
            .map(RowValues::Timestamp),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)
            .map_err(decode_err)?
            .map(RowValues::TimestampTz),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)
            .map_err(decode_err)?
            .map(RowValues::Date),
        Type::TIME => row
            .try_get::<_, Option<NaiveTime>>(idx)
            .map_err(decode_err)?
            .map(RowValues::Time),
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<Value>>(idx)
            .map_err(decode_err)?
            .map(RowValues::JSON),
        Type::BYTEA => row
            .try_get::<_, Option<Vec<u8>>>(idx)
            .map_err(decode_err)?
            .map(RowValues::Blob),
        Type::UUID => row
            .try_get::<_, Option<Uuid>>(idx)
            .map_err(decode_err)?
            .map(RowValues::Uuid),
        Type::INET => row
            .try_get::<_, Option<IpAddr>>(idx)
            .map_err(decode_err)?
            .map(|ip| RowValues::Text(ip.to_string())),
        ref other if <String as FromSql>::accepts(other) => row
            .try_get::<_, Option<String>>(idx)
            .map_err(decode_err)?
            .map(RowValues::Text),
        ref other if <EnumLabel as FromSql>::accepts(other) => row
            .try_get::<_, Option<EnumLabel>>(idx)
            .map_err(decode_err)?
            .map(|label| RowValues::Text(label.0)),
        other => {
            return Err(PgScopeError::query(format!(
                "unsupported column type {other} for column {:?}; cast it to text in the query",
                row.columns()[idx].name()
            )));
        }
    };

    Ok(value.unwrap_or(RowValues::Null))
}
