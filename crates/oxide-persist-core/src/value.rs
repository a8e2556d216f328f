//! SQL values and conversions to and from entity field types.
//!
//! `SqlValue` is the closed set of values the engine binds, embeds and scans.
//! Entity fields convert into it with [`ToSqlValue`] and back with
//! [`FromSqlValue`].

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;

use crate::error::ValueError;
use crate::schema::FieldKind;

/// A SQL value that can be bound as a parameter or embedded as a literal.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL value (also used for an absent optional field).
    Null,
    /// NULL bound for a column of a known kind, so typed drivers can pick
    /// the parameter type.
    TypedNull(FieldKind),
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Exact numeric text: fixed-point decimals and integers wider than `i64`.
    Numeric(String),
    /// Text value.
    Text(String),
    /// Timestamp value, always UTC.
    Timestamp(DateTime<Utc>),
    /// Binary blob value.
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Returns the SQL representation for inline use (escaped).
    ///
    /// **Warning**: Prefer using parameterized queries instead.
    #[must_use]
    pub fn to_sql_inline(&self) -> String {
        match self {
            Self::Null | Self::TypedNull(_) => String::from("NULL"),
            Self::Bool(b) => {
                if *b {
                    String::from("TRUE")
                } else {
                    String::from("FALSE")
                }
            }
            Self::Int(n) => format!("{n}"),
            Self::Float(f) => format!("{f}"),
            Self::Numeric(n) if is_numeric_literal(n) => n.clone(),
            Self::Numeric(s) | Self::Text(s) => quote_text(s),
            Self::Timestamp(ts) => quote_text(&ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
            Self::Blob(b) => {
                let hex: String = b.iter().map(|byte| format!("{byte:02X}")).collect();
                format!("X'{hex}'")
            }
        }
    }

    /// Returns whether this value is NULL.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null | Self::TypedNull(_))
    }

    /// Returns a short name of the variant, used in conversion errors.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Null | Self::TypedNull(_) => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Numeric(_) => "numeric",
            Self::Text(_) => "text",
            Self::Timestamp(_) => "timestamp",
            Self::Blob(_) => "blob",
        }
    }

    /// Converts a JSON value into a `SqlValue`.
    ///
    /// Arrays and objects are stored as their JSON text.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Self::Numeric(u.to_string())
                } else {
                    n.as_f64().map_or(Self::Null, Self::Float)
                }
            }
            serde_json::Value::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }
}

/// Returns whether numeric text is a plain decimal literal (`-12`, `3.50`).
///
/// Only such text may be embedded unquoted.
pub(crate) fn is_numeric_literal(s: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^-?[0-9]+(\.[0-9]+)?$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(s))
}

/// Wraps text in single quotes, doubling embedded quotes.
pub(crate) fn quote_text(s: &str) -> String {
    let escaped = s.replace('\'', "''");
    format!("'{escaped}'")
}

/// Trait for types that can be converted to SQL values.
pub trait ToSqlValue {
    /// Converts the value to a `SqlValue`.
    fn to_sql_value(self) -> SqlValue;
}

impl ToSqlValue for SqlValue {
    fn to_sql_value(self) -> SqlValue {
        self
    }
}

impl ToSqlValue for bool {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Bool(self)
    }
}

impl ToSqlValue for f64 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(self)
    }
}

impl ToSqlValue for f32 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(f64::from(self))
    }
}

impl ToSqlValue for String {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self)
    }
}

impl ToSqlValue for &str {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(String::from(self))
    }
}

impl ToSqlValue for DateTime<Utc> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Timestamp(self)
    }
}

impl ToSqlValue for NaiveDateTime {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Timestamp(self.and_utc())
    }
}

impl ToSqlValue for Vec<u8> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self)
    }
}

impl ToSqlValue for &[u8] {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self.to_vec())
    }
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    fn to_sql_value(self) -> SqlValue {
        match self {
            Some(v) => v.to_sql_value(),
            None => SqlValue::Null,
        }
    }
}

macro_rules! to_sql_int {
    ($($ty:ty),+) => {
        $(
            impl ToSqlValue for $ty {
                fn to_sql_value(self) -> SqlValue {
                    SqlValue::Int(i64::from(self))
                }
            }
        )+
    };
}

to_sql_int!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! to_sql_wide_int {
    ($($ty:ty),+) => {
        $(
            impl ToSqlValue for $ty {
                fn to_sql_value(self) -> SqlValue {
                    i64::try_from(self)
                        .map_or_else(|_| SqlValue::Numeric(self.to_string()), SqlValue::Int)
                }
            }
        )+
    };
}

to_sql_wide_int!(u64, i128, u128);

/// Trait for types that can be read back from SQL values.
pub trait FromSqlValue: Sized {
    /// Converts a `SqlValue` into this type.
    fn from_sql_value(value: SqlValue) -> Result<Self, ValueError>;
}

impl FromSqlValue for SqlValue {
    fn from_sql_value(value: SqlValue) -> Result<Self, ValueError> {
        Ok(value)
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    fn from_sql_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            value if value.is_null() => Ok(None),
            other => T::from_sql_value(other).map(Some),
        }
    }
}

impl FromSqlValue for bool {
    fn from_sql_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Bool(b) => Ok(b),
            SqlValue::Int(i) => Ok(i != 0),
            SqlValue::Text(ref s) | SqlValue::Numeric(ref s) => {
                parse_bool_text(s).ok_or_else(|| ValueError::mismatch("bool", &value))
            }
            other => Err(ValueError::mismatch("bool", &other)),
        }
    }
}

/// Parses the native textual forms of a boolean.
pub(crate) fn parse_bool_text(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "y" | "yes" => Some(true),
        "false" | "f" | "0" | "n" | "no" => Some(false),
        _ => None,
    }
}

fn to_i64(value: SqlValue, target: &'static str) -> Result<i64, ValueError> {
    match value {
        SqlValue::Int(i) => Ok(i),
        SqlValue::Bool(b) => Ok(i64::from(b)),
        SqlValue::Text(ref s) | SqlValue::Numeric(ref s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| ValueError::mismatch(target, &value)),
        other => Err(ValueError::mismatch(target, &other)),
    }
}

macro_rules! from_sql_int {
    ($($ty:ty),+) => {
        $(
            impl FromSqlValue for $ty {
                fn from_sql_value(value: SqlValue) -> Result<Self, ValueError> {
                    let wide = to_i64(value, stringify!($ty))?;
                    <$ty>::try_from(wide).map_err(|_| ValueError::OutOfRange {
                        target: stringify!($ty),
                        value: wide.to_string(),
                    })
                }
            }
        )+
    };
}

from_sql_int!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! from_sql_wide_int {
    ($($ty:ty),+) => {
        $(
            impl FromSqlValue for $ty {
                fn from_sql_value(value: SqlValue) -> Result<Self, ValueError> {
                    match value {
                        SqlValue::Int(i) => <$ty>::try_from(i).map_err(|_| ValueError::OutOfRange {
                            target: stringify!($ty),
                            value: i.to_string(),
                        }),
                        SqlValue::Text(ref s) | SqlValue::Numeric(ref s) => s
                            .trim()
                            .parse::<$ty>()
                            .map_err(|_| ValueError::mismatch(stringify!($ty), &value)),
                        other => Err(ValueError::mismatch(stringify!($ty), &other)),
                    }
                }
            }
        )+
    };
}

from_sql_wide_int!(u64, i128, u128);

impl FromSqlValue for f64 {
    #[allow(clippy::cast_precision_loss)]
    fn from_sql_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Float(f) => Ok(f),
            SqlValue::Int(i) => Ok(i as Self),
            SqlValue::Text(ref s) | SqlValue::Numeric(ref s) => s
                .trim()
                .parse::<Self>()
                .map_err(|_| ValueError::mismatch("f64", &value)),
            other => Err(ValueError::mismatch("f64", &other)),
        }
    }
}

impl FromSqlValue for f32 {
    #[allow(clippy::cast_possible_truncation)]
    fn from_sql_value(value: SqlValue) -> Result<Self, ValueError> {
        f64::from_sql_value(value).map(|f| f as Self)
    }
}

impl FromSqlValue for String {
    fn from_sql_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Text(s) | SqlValue::Numeric(s) => Ok(s),
            SqlValue::Int(i) => Ok(i.to_string()),
            SqlValue::Float(f) => Ok(f.to_string()),
            SqlValue::Bool(b) => Ok(b.to_string()),
            SqlValue::Timestamp(ts) => Ok(ts.to_rfc3339()),
            other => Err(ValueError::mismatch("String", &other)),
        }
    }
}

impl FromSqlValue for Vec<u8> {
    fn from_sql_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Blob(b) => Ok(b),
            SqlValue::Text(s) => Ok(s.into_bytes()),
            other => Err(ValueError::mismatch("Vec<u8>", &other)),
        }
    }
}

impl FromSqlValue for DateTime<Utc> {
    fn from_sql_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Timestamp(ts) => Ok(ts),
            SqlValue::Text(ref s) => {
                parse_timestamp(s).ok_or_else(|| ValueError::mismatch("DateTime<Utc>", &value))
            }
            SqlValue::Int(secs) => DateTime::from_timestamp(secs, 0).ok_or(ValueError::OutOfRange {
                target: "DateTime<Utc>",
                value: secs.to_string(),
            }),
            other => Err(ValueError::mismatch("DateTime<Utc>", &other)),
        }
    }
}

impl FromSqlValue for NaiveDateTime {
    fn from_sql_value(value: SqlValue) -> Result<Self, ValueError> {
        DateTime::<Utc>::from_sql_value(value).map(|ts| ts.naive_utc())
    }
}

/// Parses RFC 3339 first, then the common `YYYY-MM-DD HH:MM:SS[.f]` form.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                .map(|dt| dt.and_utc())
                .ok()
        })
}
