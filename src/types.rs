use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Values that can be bound as statement parameters or read back from a row.
///
/// ```rust
/// use pgscope::RowValues;
///
/// let params = vec![
///     RowValues::Text("alice".into()),
///     RowValues::Int(42),
///     RowValues::Null,
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Exact decimal (`numeric`)
    Numeric(Decimal),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp without time zone
    Timestamp(NaiveDateTime),
    /// Timestamp with time zone, normalised to UTC
    TimestampTz(DateTime<Utc>),
    /// Calendar date
    Date(NaiveDate),
    /// Time of day
    Time(NaiveTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
    Uuid(Uuid),
}

impl RowValues {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let RowValues::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_numeric(&self) -> Option<Decimal> {
        if let RowValues::Numeric(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_uuid(&self) -> Option<Uuid> {
        if let RowValues::Uuid(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            RowValues::Timestamp(value) => Some(*value),
            RowValues::TimestampTz(value) => Some(value.naive_utc()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_date(&self) -> Option<NaiveDate> {
        if let RowValues::Date(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }
}

impl From<i64> for RowValues {
    fn from(value: i64) -> Self {
        RowValues::Int(value)
    }
}

impl From<i32> for RowValues {
    fn from(value: i32) -> Self {
        RowValues::Int(i64::from(value))
    }
}

impl From<f64> for RowValues {
    fn from(value: f64) -> Self {
        RowValues::Float(value)
    }
}

impl From<Decimal> for RowValues {
    fn from(value: Decimal) -> Self {
        RowValues::Numeric(value)
    }
}

impl From<Uuid> for RowValues {
    fn from(value: Uuid) -> Self {
        RowValues::Uuid(value)
    }
}

impl From<bool> for RowValues {
    fn from(value: bool) -> Self {
        RowValues::Bool(value)
    }
}

impl From<&str> for RowValues {
    fn from(value: &str) -> Self {
        RowValues::Text(value.to_string())
    }
}

impl From<String> for RowValues {
    fn from(value: String) -> Self {
        RowValues::Text(value)
    }
}

impl<T: Into<RowValues>> From<Option<T>> for RowValues {
    fn from(value: Option<T>) -> Self {
        value.map_or(RowValues::Null, Into::into)
    }
}

impl Serialize for RowValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RowValues::Int(i) => serializer.serialize_i64(*i),
            RowValues::Float(f) => serializer.serialize_f64(*f),
            // as a string, so no precision is lost on the way through f64
            RowValues::Numeric(d) => serializer.collect_str(d),
            RowValues::Text(s) => serializer.serialize_str(s),
            RowValues::Bool(b) => serializer.serialize_bool(*b),
            RowValues::Timestamp(dt) => dt.serialize(serializer),
            RowValues::TimestampTz(dt) => dt.serialize(serializer),
            RowValues::Date(d) => d.serialize(serializer),
            RowValues::Time(t) => t.serialize(serializer),
            RowValues::Null => serializer.serialize_none(),
            RowValues::JSON(value) => value.serialize(serializer),
            RowValues::Blob(bytes) => serializer.serialize_bytes(bytes),
            RowValues::Uuid(id) => serializer.collect_str(id),
        }
    }
}
