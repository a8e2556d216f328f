//! Mapping result rows back into entities.

use crate::codec::decode_bool;
use crate::error::ScanError;
use crate::schema::{Entity, EntitySchema, FieldKind};
use crate::value::SqlValue;

/// A driver-neutral result row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    /// Column names as reported by the driver.
    pub columns: Vec<String>,
    /// Values in column order.
    pub values: Vec<SqlValue>,
}

impl Row {
    /// Creates a row.
    #[must_use]
    pub const fn new(columns: Vec<String>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    /// Returns the value of a column, ignoring case.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .and_then(|i| self.values.get(i))
    }

    /// Returns the first value of the row.
    #[must_use]
    pub fn first(&self) -> Option<&SqlValue> {
        self.values.first()
    }

    /// Returns the number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns whether the row has no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Builds an entity from a row.
///
/// Columns are matched to fields by persisted name, ignoring case. Columns
/// that map to no field are discarded. Boolean fields honour their stored
/// tokens.
pub fn scan_row<E: Entity>(row: &Row, schema: &EntitySchema) -> Result<E, ScanError> {
    if row.columns.len() != row.values.len() {
        return Err(ScanError::RowShape {
            columns: row.columns.len(),
            values: row.values.len(),
        });
    }

    let mut entity = E::default();
    for (name, value) in row.columns.iter().zip(&row.values) {
        let Some(position) = schema.column_position(name) else {
            continue;
        };
        let column = &schema.columns()[position];
        let value = match (column.kind, decode_bool(column, value)) {
            (FieldKind::Bool, Some(b)) => SqlValue::Bool(b),
            _ => value.clone(),
        };
        entity
            .set_field_value(column.field, value)
            .map_err(|source| ScanError::Value {
                column: column.column.clone(),
                source,
            })?;
    }
    Ok(entity)
}

/// Builds one entity per row.
pub fn scan_rows<E: Entity>(rows: &[Row], schema: &EntitySchema) -> Result<Vec<E>, ScanError> {
    rows.iter().map(|row| scan_row(row, schema)).collect()
}
