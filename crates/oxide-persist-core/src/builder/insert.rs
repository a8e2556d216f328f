//! Single-row INSERT.

use super::{Params, Statement};
use crate::dialect::Dialect;
use crate::error::BuildError;
use crate::schema::{Entity, EntitySchema};
use crate::value::SqlValue;

/// Options for [`build_insert`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOptions {
    /// Bind absent optional fields as NULL instead of omitting the column.
    pub include_null: bool,
}

/// Builds `INSERT INTO table (cols...) VALUES (params...)`.
///
/// Only insertable columns are written. Absent optional fields are skipped
/// unless `include_null` is set. The version column, if any, is always
/// written as `1`.
pub fn build_insert<E: Entity>(
    table: &str,
    schema: &EntitySchema,
    entity: &E,
    dialect: Dialect,
    options: InsertOptions,
) -> Result<Statement, BuildError> {
    let version = schema.version_position();
    let mut params = Params::new(dialect);
    let mut columns = Vec::new();
    let mut placeholders = Vec::new();

    for (position, column) in schema.columns().iter().enumerate() {
        if !column.insertable {
            continue;
        }
        let value = if Some(position) == version {
            SqlValue::Int(1)
        } else {
            entity.field_value(column.field)
        };
        if value.is_null() && !options.include_null {
            continue;
        }
        let placeholder = params.bind_column(column, &value)?;
        columns.push(column.column.as_str());
        placeholders.push(placeholder);
    }

    if columns.is_empty() {
        return Err(BuildError::EmptyInsert {
            table: String::from(table),
        });
    }

    let sql = format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    );
    Ok(params.finish(sql))
}
