//! Value codec: turns field values into bound parameters or inline literals.
//!
//! Literal embedding is used where it keeps multi-row statements within
//! driver parameter limits. Any value that cannot be embedded safely is
//! reported as not representable, and the caller binds it instead.

use crate::dialect::Dialect;
use crate::schema::{ColumnDescriptor, FieldKind};
use crate::value::{is_numeric_literal, parse_bool_text, quote_text, SqlValue};

/// Converts a value into the parameter to bind.
///
/// Floats with a scale bind as fixed-point text. Returns `None` only for
/// values that cannot be bound at all (non-finite floats).
#[must_use]
pub fn to_parameter(value: &SqlValue, scale: Option<u32>) -> Option<SqlValue> {
    match (value, scale) {
        (SqlValue::Float(f), _) if !f.is_finite() => None,
        (SqlValue::Float(f), Some(scale)) => Some(SqlValue::Numeric(format_scaled(*f, scale))),
        _ => Some(value.clone()),
    }
}

/// Converts a value into an inline SQL literal.
///
/// Returns `None` when the value must be bound instead. That covers floats
/// without a scale, numeric text that is not a plain decimal number,
/// booleans on dialects without boolean literals, timestamps and blobs.
#[must_use]
pub fn to_literal(value: &SqlValue, scale: Option<u32>, dialect: Dialect) -> Option<String> {
    match value {
        SqlValue::Null | SqlValue::TypedNull(_) => Some(String::from("NULL")),
        SqlValue::Int(i) => Some(i.to_string()),
        SqlValue::Numeric(n) => is_numeric_literal(n).then(|| n.clone()),
        SqlValue::Text(s) => Some(quote_text(s)),
        SqlValue::Float(f) => match scale {
            Some(scale) if f.is_finite() => Some(format_scaled(*f, scale)),
            _ => None,
        },
        SqlValue::Bool(b) => dialect
            .supports_bool()
            .then(|| String::from(if *b { "TRUE" } else { "FALSE" })),
        SqlValue::Timestamp(_) | SqlValue::Blob(_) => None,
    }
}

fn format_scaled(f: f64, scale: u32) -> String {
    format!("{f:.prec$}", prec = scale as usize)
}

/// Replaces a boolean with the column's stored token, if it declares one.
#[must_use]
pub fn encode_bool_token(column: &ColumnDescriptor, value: &SqlValue) -> Option<SqlValue> {
    match (value, &column.bool_tokens) {
        (SqlValue::Bool(b), Some((on, off))) => {
            Some(SqlValue::Text(if *b { on.clone() } else { off.clone() }))
        }
        _ => None,
    }
}

/// Converts a column's value into the parameter to bind.
///
/// A NULL carries the column's stored kind so typed drivers bind it with
/// a matching parameter type.
#[must_use]
pub fn column_parameter(column: &ColumnDescriptor, value: &SqlValue) -> Option<SqlValue> {
    if value.is_null() {
        return Some(SqlValue::TypedNull(stored_kind(column)));
    }
    encode_bool_token(column, value).or_else(|| to_parameter(value, column.scale))
}

/// Kind of the values actually written to a column.
#[must_use]
pub fn stored_kind(column: &ColumnDescriptor) -> FieldKind {
    match (column.kind, &column.bool_tokens) {
        (FieldKind::Bool, Some(_)) => FieldKind::Text,
        (kind, _) => kind,
    }
}

/// Converts a column's value into an inline literal.
#[must_use]
pub fn column_literal(
    column: &ColumnDescriptor,
    value: &SqlValue,
    dialect: Dialect,
) -> Option<String> {
    encode_bool_token(column, value).map_or_else(
        || to_literal(value, column.scale, dialect),
        |token| to_literal(&token, None, dialect),
    )
}

/// Reads a stored boolean back, honouring the column's tokens.
///
/// Values matching neither token fall back to the native textual forms.
#[must_use]
pub fn decode_bool(column: &ColumnDescriptor, value: &SqlValue) -> Option<bool> {
    match value {
        SqlValue::Bool(b) => Some(*b),
        SqlValue::Int(i) => Some(*i != 0),
        SqlValue::Text(s) | SqlValue::Numeric(s) => {
            if let Some((on, off)) = &column.bool_tokens {
                if s == on {
                    return Some(true);
                }
                if s == off {
                    return Some(false);
                }
            }
            parse_bool_text(s)
        }
        _ => None,
    }
}
