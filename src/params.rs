use std::error::Error;
use std::str::FromStr;

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use uuid::Uuid;

use crate::types::RowValues;

/// Borrowed view of bind parameters in the shape the driver expects.
pub struct Params<'a> {
    references: Vec<&'a (dyn ToSql + Sync)>,
}

impl<'a> Params<'a> {
    /// Convert from a slice of `RowValues` to driver parameters
    #[must_use]
    pub fn convert(params: &'a [RowValues]) -> Params<'a> {
        let references: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        Params { references }
    }

    #[must_use]
    pub fn as_refs(&self) -> &[&(dyn ToSql + Sync)] {
        &self.references
    }
}

type BindError = Box<dyn Error + Sync + Send>;

fn mismatch(what: &str, ty: &Type) -> BindError {
    format!("cannot bind {what} to a {ty} parameter").into()
}

/// Text-like parameter types (text, varchar, bpchar, name, unknown, citext, ...).
fn is_text_like(ty: &Type) -> bool {
    <String as ToSql>::accepts(ty)
}

/// PostgreSQL's boolean input spellings.
fn parse_bool(s: &str) -> Result<bool, BindError> {
    match s.to_ascii_lowercase().as_str() {
        "t" | "true" | "y" | "yes" | "on" | "1" => Ok(true),
        "f" | "false" | "n" | "no" | "off" | "0" => Ok(false),
        _ => Err(format!("invalid boolean {s:?}").into()),
    }
}

fn parse_timestamp(s: &str) -> Result<NaiveDateTime, BindError> {
    const FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
    for format in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN));
    }
    Err(format!("invalid timestamp {s:?}").into())
}

// An offset-less value is taken as UTC.
fn parse_timestamptz(s: &str) -> Result<DateTime<Utc>, BindError> {
    const FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"];
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Ok(dt.with_timezone(&Utc));
        }
    }
    parse_timestamp(s)
        .map(|naive| naive.and_utc())
        .map_err(|_| format!("invalid timestamptz {s:?}").into())
}

fn parse_time(s: &str) -> Result<NaiveTime, BindError> {
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|_| format!("invalid time {s:?}").into())
}

fn bind_text(s: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BindError> {
    let trimmed = s.trim();
    match *ty {
        Type::INT2 => trimmed.parse::<i16>()?.to_sql(ty, out),
        Type::INT4 => trimmed.parse::<i32>()?.to_sql(ty, out),
        Type::INT8 => trimmed.parse::<i64>()?.to_sql(ty, out),
        Type::FLOAT4 => trimmed.parse::<f32>()?.to_sql(ty, out),
        Type::FLOAT8 => trimmed.parse::<f64>()?.to_sql(ty, out),
        Type::NUMERIC => Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))?
            .to_sql(ty, out),
        Type::BOOL => parse_bool(trimmed)?.to_sql(ty, out),
        Type::TIMESTAMP => parse_timestamp(trimmed)?.to_sql(ty, out),
        Type::TIMESTAMPTZ => parse_timestamptz(trimmed)?.to_sql(ty, out),
        Type::DATE => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .map_err(|_| format!("invalid date {trimmed:?}"))?
            .to_sql(ty, out),
        Type::TIME => parse_time(trimmed)?.to_sql(ty, out),
        Type::UUID => Uuid::parse_str(trimmed)?.to_sql(ty, out),
        Type::JSON | Type::JSONB => serde_json::from_str::<serde_json::Value>(s)?.to_sql(ty, out),
        _ if is_text_like(ty) => s.to_sql(ty, out),
        _ => Err(mismatch("text", ty)),
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
impl ToSql for RowValues {
    // Binds against the parameter type the server inferred, so an `Int` can
    // feed an int4 column without the caller choosing a width. Every arm
    // checks `ty` before writing; a mismatch never reaches the wire.
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BindError> {
        match self {
            RowValues::Int(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                Type::INT8 => i.to_sql(ty, out),
                Type::FLOAT4 => (*i as f32).to_sql(ty, out),
                Type::FLOAT8 => (*i as f64).to_sql(ty, out),
                Type::NUMERIC => Decimal::from(*i).to_sql(ty, out),
                _ if is_text_like(ty) => i.to_string().to_sql(ty, out),
                _ => Err(mismatch("an integer", ty)),
            },
            RowValues::Float(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                Type::FLOAT8 => f.to_sql(ty, out),
                // via the shortest decimal rendering, so 9.5 stays 9.5
                Type::NUMERIC => Decimal::from_str(&f.to_string())
                    .or_else(|_| Decimal::from_scientific(&format!("{f:e}")))?
                    .to_sql(ty, out),
                _ if is_text_like(ty) => f.to_string().to_sql(ty, out),
                _ => Err(mismatch("a float", ty)),
            },
            RowValues::Numeric(d) => match *ty {
                Type::NUMERIC => d.to_sql(ty, out),
                Type::FLOAT4 | Type::FLOAT8 => {
                    let f = d
                        .to_f64()
                        .ok_or_else(|| format!("numeric {d} does not fit a float"))?;
                    RowValues::Float(f).to_sql(ty, out)
                }
                _ if is_text_like(ty) => d.to_string().to_sql(ty, out),
                _ => Err(mismatch("a numeric", ty)),
            },
            RowValues::Text(s) => bind_text(s, ty, out),
            RowValues::Bool(b) => match *ty {
                Type::BOOL => b.to_sql(ty, out),
                _ if is_text_like(ty) => b.to_string().to_sql(ty, out),
                _ => Err(mismatch("a boolean", ty)),
            },
            RowValues::Timestamp(dt) => match *ty {
                Type::TIMESTAMP => dt.to_sql(ty, out),
                Type::TIMESTAMPTZ => dt.and_utc().to_sql(ty, out),
                Type::DATE => dt.date().to_sql(ty, out),
                _ if is_text_like(ty) => dt.to_string().to_sql(ty, out),
                _ => Err(mismatch("a timestamp", ty)),
            },
            RowValues::TimestampTz(dt) => match *ty {
                Type::TIMESTAMPTZ => dt.to_sql(ty, out),
                Type::TIMESTAMP => dt.naive_utc().to_sql(ty, out),
                Type::DATE => dt.date_naive().to_sql(ty, out),
                _ if is_text_like(ty) => dt.to_rfc3339().to_sql(ty, out),
                _ => Err(mismatch("a timestamptz", ty)),
            },
            RowValues::Date(d) => match *ty {
                Type::DATE => d.to_sql(ty, out),
                Type::TIMESTAMP => d.and_time(NaiveTime::MIN).to_sql(ty, out),
                Type::TIMESTAMPTZ => d.and_time(NaiveTime::MIN).and_utc().to_sql(ty, out),
                _ if is_text_like(ty) => d.to_string().to_sql(ty, out),
                _ => Err(mismatch("a date", ty)),
            },
            RowValues::Time(t) => match *ty {
                Type::TIME => t.to_sql(ty, out),
                _ if is_text_like(ty) => t.to_string().to_sql(ty, out),
                _ => Err(mismatch("a time", ty)),
            },
            RowValues::Null => Ok(IsNull::Yes),
            RowValues::JSON(jsval) => match *ty {
                Type::JSON | Type::JSONB => jsval.to_sql(ty, out),
                _ if is_text_like(ty) => jsval.to_string().to_sql(ty, out),
                _ => Err(mismatch("a json value", ty)),
            },
            RowValues::Blob(bytes) => match *ty {
                Type::BYTEA => bytes.to_sql(ty, out),
                _ => Err(mismatch("bytes", ty)),
            },
            RowValues::Uuid(id) => match *ty {
                Type::UUID => id.to_sql(ty, out),
                _ if is_text_like(ty) => id.to_string().to_sql(ty, out),
                _ => Err(mismatch("a uuid", ty)),
            },
        }
    }

    fn accepts(ty: &Type) -> bool {
        matches!(
            *ty,
            Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::NUMERIC
                | Type::BOOL
                | Type::TIMESTAMP
                | Type::TIMESTAMPTZ
                | Type::DATE
                | Type::TIME
                | Type::UUID
                | Type::JSON
                | Type::JSONB
                | Type::BYTEA
        ) || is_text_like(ty)
    }

    to_sql_checked!();
}
