//! SQL value types for database-agnostic data transfer.
//!
//! Rows travel from the source reader to the target writer as `SqlValue`s.
//! Before a row is written each value is coerced to the canonical type of the
//! matching target column, so a SQLite `0`/`1` lands in a PostgreSQL BOOLEAN
//! as `false`/`true`.

use std::borrow::Cow;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::schema::CanonicalType;
use crate::error::{Result, SyncError};

/// Format used when a timestamp has to travel as text.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Format used when a date has to travel as text.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Type hint for NULL values.
///
/// PostgreSQL needs typed parameters even for NULL, so a NULL remembers the
/// type of the column it came from or is headed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlNullType {
    Bool,
    I32,
    I64,
    F32,
    F64,
    Decimal,
    String,
    Bytes,
    DateTime,
    Date,
}

impl SqlNullType {
    /// The null type for a column of the given canonical type.
    pub fn for_canonical(ty: &CanonicalType) -> Self {
        match ty {
            CanonicalType::Integer => SqlNullType::I32,
            CanonicalType::BigInt => SqlNullType::I64,
            CanonicalType::Float => SqlNullType::F32,
            CanonicalType::Double => SqlNullType::F64,
            CanonicalType::Decimal { .. } => SqlNullType::Decimal,
            CanonicalType::Boolean => SqlNullType::Bool,
            CanonicalType::DateTime => SqlNullType::DateTime,
            CanonicalType::Date => SqlNullType::Date,
            CanonicalType::Blob => SqlNullType::Bytes,
            CanonicalType::Text | CanonicalType::Varchar(_) | CanonicalType::Unknown(_) => {
                SqlNullType::String
            }
        }
    }
}

/// SQL value enum for type-safe row handling.
///
/// Uses `Cow` for string and byte data so readers can borrow from a row buffer
/// and only allocate when the value has to outlive it.
///
/// # Example
///
/// ```rust
/// use std::borrow::Cow;
/// use syncdb::core::SqlValue;
///
/// let borrowed: SqlValue<'_> = SqlValue::Text(Cow::Borrowed("hello"));
/// let owned: SqlValue<'static> = borrowed.into_owned();
/// assert!(!owned.is_null());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue<'a> {
    /// NULL with type hint.
    Null(SqlNullType),

    /// Boolean value.
    Bool(bool),

    /// 32-bit signed integer.
    I32(i32),

    /// 64-bit signed integer.
    I64(i64),

    /// 32-bit floating point.
    F32(f32),

    /// 64-bit floating point.
    F64(f64),

    /// Exact decimal.
    Decimal(Decimal),

    /// Text data.
    Text(Cow<'a, str>),

    /// Binary data.
    Bytes(Cow<'a, [u8]>),

    /// Timestamp without timezone.
    DateTime(NaiveDateTime),

    /// Date without time component.
    Date(NaiveDate),
}

impl<'a> SqlValue<'a> {
    /// Convert to a fully owned value with `'static` lifetime.
    #[must_use]
    pub fn into_owned(self) -> SqlValue<'static> {
        match self {
            SqlValue::Null(t) => SqlValue::Null(t),
            SqlValue::Bool(v) => SqlValue::Bool(v),
            SqlValue::I32(v) => SqlValue::I32(v),
            SqlValue::I64(v) => SqlValue::I64(v),
            SqlValue::F32(v) => SqlValue::F32(v),
            SqlValue::F64(v) => SqlValue::F64(v),
            SqlValue::Decimal(v) => SqlValue::Decimal(v),
            SqlValue::Text(v) => SqlValue::Text(Cow::Owned(v.into_owned())),
            SqlValue::Bytes(v) => SqlValue::Bytes(Cow::Owned(v.into_owned())),
            SqlValue::DateTime(v) => SqlValue::DateTime(v),
            SqlValue::Date(v) => SqlValue::Date(v),
        }
    }

    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null(_))
    }

    /// Get the SqlNullType for this value.
    #[must_use]
    pub fn null_type(&self) -> SqlNullType {
        match self {
            SqlValue::Null(t) => *t,
            SqlValue::Bool(_) => SqlNullType::Bool,
            SqlValue::I32(_) => SqlNullType::I32,
            SqlValue::I64(_) => SqlNullType::I64,
            SqlValue::F32(_) => SqlNullType::F32,
            SqlValue::F64(_) => SqlNullType::F64,
            SqlValue::Decimal(_) => SqlNullType::Decimal,
            SqlValue::Text(_) => SqlNullType::String,
            SqlValue::Bytes(_) => SqlNullType::Bytes,
            SqlValue::DateTime(_) => SqlNullType::DateTime,
            SqlValue::Date(_) => SqlNullType::Date,
        }
    }

    /// Render the value as text, the way it would be written into a text
    /// column. Returns `None` for NULL.
    pub fn to_text(&self) -> Option<String> {
        match self {
            SqlValue::Null(_) => None,
            SqlValue::Bool(b) => Some(b.to_string()),
            SqlValue::I32(n) => Some(n.to_string()),
            SqlValue::I64(n) => Some(n.to_string()),
            SqlValue::F32(n) => Some(n.to_string()),
            SqlValue::F64(n) => Some(n.to_string()),
            SqlValue::Decimal(d) => Some(d.to_string()),
            SqlValue::Text(s) => Some(s.to_string()),
            SqlValue::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
            SqlValue::DateTime(dt) => Some(dt.format(DATETIME_FORMAT).to_string()),
            SqlValue::Date(d) => Some(d.format(DATE_FORMAT).to_string()),
        }
    }

    /// Coerce the value to the given canonical column type.
    ///
    /// NULL stays NULL with the target's type hint. Values of an unknown
    /// canonical type pass through unchanged.
    pub fn coerce(self, target: &CanonicalType) -> Result<SqlValue<'static>> {
        if self.is_null() {
            return Ok(SqlValue::Null(SqlNullType::for_canonical(target)));
        }

        match target {
            CanonicalType::Integer => {
                let n = self.to_i64()?;
                i32::try_from(n)
                    .map(SqlValue::I32)
                    .map_err(|_| SyncError::Coercion(format!("{} does not fit in integer", n)))
            }
            CanonicalType::BigInt => self.to_i64().map(SqlValue::I64),
            CanonicalType::Float => self.to_f64().map(|v| SqlValue::F32(v as f32)),
            CanonicalType::Double => self.to_f64().map(SqlValue::F64),
            CanonicalType::Decimal { .. } => self.to_decimal().map(SqlValue::Decimal),
            CanonicalType::Boolean => self.to_bool().map(SqlValue::Bool),
            CanonicalType::Text | CanonicalType::Varchar(_) => match self {
                SqlValue::Bytes(b) => String::from_utf8(b.into_owned())
                    .map(|s| SqlValue::Text(Cow::Owned(s)))
                    .map_err(|_| SyncError::Coercion("binary data is not valid UTF-8".into())),
                other => Ok(SqlValue::Text(Cow::Owned(
                    other.to_text().unwrap_or_default(),
                ))),
            },
            CanonicalType::DateTime => self.to_datetime().map(SqlValue::DateTime),
            CanonicalType::Date => self.to_date().map(SqlValue::Date),
            CanonicalType::Blob => match self {
                SqlValue::Bytes(b) => Ok(SqlValue::Bytes(Cow::Owned(b.into_owned()))),
                SqlValue::Text(s) => Ok(SqlValue::Bytes(Cow::Owned(s.into_owned().into_bytes()))),
                other => Err(SyncError::Coercion(format!(
                    "cannot store {:?} as blob",
                    other.null_type()
                ))),
            },
            CanonicalType::Unknown(_) => Ok(self.into_owned()),
        }
    }

    fn to_i64(&self) -> Result<i64> {
        match self {
            SqlValue::Bool(b) => Ok(i64::from(*b)),
            SqlValue::I32(n) => Ok(i64::from(*n)),
            SqlValue::I64(n) => Ok(*n),
            SqlValue::F32(v) => float_to_i64(f64::from(*v)),
            SqlValue::F64(v) => float_to_i64(*v),
            SqlValue::Decimal(d) if d.fract().is_zero() => d
                .to_i64()
                .ok_or_else(|| SyncError::Coercion(format!("{} is out of range", d))),
            SqlValue::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| SyncError::Coercion(format!("'{}' is not an integer", s))),
            other => Err(mismatch(other, "an integer")),
        }
    }

    fn to_f64(&self) -> Result<f64> {
        match self {
            SqlValue::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            SqlValue::I32(n) => Ok(f64::from(*n)),
            SqlValue::I64(n) => Ok(*n as f64),
            SqlValue::F32(v) => Ok(f64::from(*v)),
            SqlValue::F64(v) => Ok(*v),
            SqlValue::Decimal(d) => d
                .to_f64()
                .ok_or_else(|| SyncError::Coercion(format!("{} is out of range", d))),
            SqlValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| SyncError::Coercion(format!("'{}' is not a number", s))),
            other => Err(mismatch(other, "a number")),
        }
    }

    fn to_decimal(&self) -> Result<Decimal> {
        match self {
            SqlValue::Bool(b) => Ok(Decimal::from(u8::from(*b))),
            SqlValue::I32(n) => Ok(Decimal::from(*n)),
            SqlValue::I64(n) => Ok(Decimal::from(*n)),
            SqlValue::F32(v) => Decimal::try_from(*v)
                .map_err(|e| SyncError::Coercion(format!("{}: {}", v, e))),
            SqlValue::F64(v) => Decimal::try_from(*v)
                .map_err(|e| SyncError::Coercion(format!("{}: {}", v, e))),
            SqlValue::Decimal(d) => Ok(*d),
            SqlValue::Text(s) => Decimal::from_str(s.trim())
                .or_else(|_| Decimal::from_scientific(s.trim()))
                .map_err(|_| SyncError::Coercion(format!("'{}' is not a decimal", s))),
            other => Err(mismatch(other, "a decimal")),
        }
    }

    fn to_bool(&self) -> Result<bool> {
        match self {
            SqlValue::Bool(b) => Ok(*b),
            SqlValue::I32(n) => Ok(*n != 0),
            SqlValue::I64(n) => Ok(*n != 0),
            SqlValue::F32(v) => Ok(*v != 0.0),
            SqlValue::F64(v) => Ok(*v != 0.0),
            SqlValue::Decimal(d) => Ok(!d.is_zero()),
            SqlValue::Text(s) => match s.trim().to_lowercase().as_str() {
                "1" | "t" | "true" | "y" | "yes" | "on" => Ok(true),
                "0" | "f" | "false" | "n" | "no" | "off" => Ok(false),
                _ => Err(SyncError::Coercion(format!("'{}' is not a boolean", s))),
            },
            other => Err(mismatch(other, "a boolean")),
        }
    }

    fn to_datetime(&self) -> Result<NaiveDateTime> {
        match self {
            SqlValue::DateTime(dt) => Ok(*dt),
            SqlValue::Date(d) => Ok(d.and_time(NaiveTime::MIN)),
            SqlValue::I64(secs) => DateTime::from_timestamp(*secs, 0)
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| SyncError::Coercion(format!("{} is not a valid timestamp", secs))),
            SqlValue::Text(s) => parse_datetime(s.trim())
                .ok_or_else(|| SyncError::Coercion(format!("'{}' is not a timestamp", s))),
            other => Err(mismatch(other, "a timestamp")),
        }
    }

    fn to_date(&self) -> Result<NaiveDate> {
        match self {
            SqlValue::Date(d) => Ok(*d),
            SqlValue::DateTime(dt) => Ok(dt.date()),
            SqlValue::Text(s) => {
                let s = s.trim();
                NaiveDate::parse_from_str(s, DATE_FORMAT)
                    .ok()
                    .or_else(|| parse_datetime(s).map(|dt| dt.date()))
                    .ok_or_else(|| SyncError::Coercion(format!("'{}' is not a date", s)))
            }
            other => Err(mismatch(other, "a date")),
        }
    }
}

fn mismatch(value: &SqlValue<'_>, wanted: &str) -> SyncError {
    SyncError::Coercion(format!("{:?} value is not {}", value.null_type(), wanted))
}

fn float_to_i64(v: f64) -> Result<i64> {
    // i64::MAX rounds up to 2^63 as f64, which is already out of range
    if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
        Ok(v as i64)
    } else {
        Err(SyncError::Coercion(format!("{} is not an integer", v)))
    }
}

/// Parse the timestamp spellings the supported databases produce as text.
fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 3] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];

    FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc()))
        .or_else(|| {
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

impl From<bool> for SqlValue<'static> {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i32> for SqlValue<'static> {
    fn from(v: i32) -> Self {
        SqlValue::I32(v)
    }
}

impl From<i64> for SqlValue<'static> {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<f64> for SqlValue<'static> {
    fn from(v: f64) -> Self {
        SqlValue::F64(v)
    }
}

impl From<String> for SqlValue<'static> {
    fn from(v: String) -> Self {
        SqlValue::Text(Cow::Owned(v))
    }
}

impl<'a> From<&'a str> for SqlValue<'a> {
    fn from(v: &'a str) -> Self {
        SqlValue::Text(Cow::Borrowed(v))
    }
}

impl From<Vec<u8>> for SqlValue<'static> {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(Cow::Owned(v))
    }
}

impl From<Decimal> for SqlValue<'static> {
    fn from(v: Decimal) -> Self {
        SqlValue::Decimal(v)
    }
}

impl From<NaiveDateTime> for SqlValue<'static> {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::DateTime(v)
    }
}

impl From<NaiveDate> for SqlValue<'static> {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

/// A batch of rows for streaming transfer.
///
/// Batches flow through a bounded channel from the reader task to the copier,
/// so at most a few batches of a table are held in memory at once.
#[derive(Debug)]
pub struct Batch {
    /// Rows in this batch (owned for channel transfer).
    pub rows: Vec<Vec<SqlValue<'static>>>,

    /// Whether this is the final batch for the table.
    pub is_last: bool,
}

impl Batch {
    /// Create a new batch with the given rows.
    pub fn new(rows: Vec<Vec<SqlValue<'static>>>) -> Self {
        Self {
            rows,
            is_last: false,
        }
    }

    /// Create an empty final batch.
    pub fn empty_final() -> Self {
        Self {
            rows: Vec::new(),
            is_last: true,
        }
    }

    /// Mark this as the final batch.
    pub fn mark_final(mut self) -> Self {
        self.is_last = true;
        self
    }

    /// Get the number of rows in this batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_value_into_owned() {
        let borrowed: SqlValue<'_> = SqlValue::Text(Cow::Borrowed("hello"));
        let owned: SqlValue<'static> = borrowed.into_owned();
        assert_eq!(owned, SqlValue::Text(Cow::Owned("hello".to_string())));
    }

    #[test]
    fn test_batch_operations() {
        let batch = Batch::new(vec![
            vec![SqlValue::I32(1), SqlValue::from("a".to_string())],
            vec![SqlValue::I32(2), SqlValue::from("b".to_string())],
        ]);

        assert_eq!(batch.len(), 2);
        assert!(!batch.is_empty());
        assert!(!batch.is_last);
        assert!(batch.mark_final().is_last);
    }

    #[test]
    fn test_coerce_integer_to_boolean() {
        assert_eq!(
            SqlValue::I64(1).coerce(&CanonicalType::Boolean).unwrap(),
            SqlValue::Bool(true)
        );
        assert_eq!(
            SqlValue::I64(0).coerce(&CanonicalType::Boolean).unwrap(),
            SqlValue::Bool(false)
        );
    }

    #[test]
    fn test_coerce_boolean_to_integer() {
        assert_eq!(
            SqlValue::Bool(true).coerce(&CanonicalType::Integer).unwrap(),
            SqlValue::I32(1)
        );
    }

    #[test]
    fn test_coerce_text_to_boolean() {
        assert_eq!(
            SqlValue::from("TRUE").coerce(&CanonicalType::Boolean).unwrap(),
            SqlValue::Bool(true)
        );
        assert!(SqlValue::from("maybe")
            .coerce(&CanonicalType::Boolean)
            .is_err());
    }

    #[test]
    fn test_coerce_null_takes_target_hint() {
        let v = SqlValue::Null(SqlNullType::String)
            .coerce(&CanonicalType::BigInt)
            .unwrap();
        assert_eq!(v, SqlValue::Null(SqlNullType::I64));
    }

    #[test]
    fn test_coerce_integer_overflow_fails() {
        assert!(SqlValue::I64(i64::from(i32::MAX) + 1)
            .coerce(&CanonicalType::Integer)
            .is_err());
    }

    #[test]
    fn test_coerce_text_to_datetime() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        for s in ["2024-03-01 12:30:00", "2024-03-01T12:30:00", "2024-03-01T12:30:00Z"] {
            assert_eq!(
                SqlValue::from(s).coerce(&CanonicalType::DateTime).unwrap(),
                SqlValue::DateTime(expected),
                "input {}",
                s
            );
        }
    }

    #[test]
    fn test_coerce_datetime_to_text() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(8, 5, 9)
            .unwrap();
        assert_eq!(
            SqlValue::DateTime(dt).coerce(&CanonicalType::Text).unwrap(),
            SqlValue::from("2024-03-01 08:05:09".to_string())
        );
    }

    #[test]
    fn test_coerce_text_to_decimal() {
        let v = SqlValue::from("12.50")
            .coerce(&CanonicalType::Decimal {
                precision: 10,
                scale: 2,
            })
            .unwrap();
        assert_eq!(v, SqlValue::Decimal(Decimal::new(1250, 2)));
    }

    #[test]
    fn test_coerce_fractional_float_to_integer_fails() {
        assert!(SqlValue::F64(1.5).coerce(&CanonicalType::BigInt).is_err());
        assert_eq!(
            SqlValue::F64(3.0).coerce(&CanonicalType::BigInt).unwrap(),
            SqlValue::I64(3)
        );
    }

    #[test]
    fn test_coerce_float_at_i64_bounds() {
        assert!(SqlValue::F64(9_223_372_036_854_775_808.0)
            .coerce(&CanonicalType::BigInt)
            .is_err());
        assert_eq!(
            SqlValue::F64(-9_223_372_036_854_775_808.0)
                .coerce(&CanonicalType::BigInt)
                .unwrap(),
            SqlValue::I64(i64::MIN)
        );
    }

    #[test]
    fn test_coerce_unknown_passes_through() {
        let v = SqlValue::from("POINT(1 2)")
            .coerce(&CanonicalType::Unknown("geometry".into()))
            .unwrap();
        assert_eq!(v, SqlValue::from("POINT(1 2)".to_string()));
    }
}
