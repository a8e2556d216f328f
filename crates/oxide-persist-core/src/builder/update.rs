//! Full-row UPDATE with optional optimistic-lock predicate.

use super::{key_predicate, resolve_key, version_increment, Key, Params, Statement};
use crate::dialect::Dialect;
use crate::error::BuildError;
use crate::schema::{Entity, EntitySchema};

/// Builds `UPDATE table SET ... WHERE keys [AND version = current]`.
///
/// Every updatable non-key column is assigned; absent optional fields are
/// bound as NULL. With a version column the SET list increments it and the
/// WHERE clause compares it against the entity's current value.
pub fn build_update<E: Entity>(
    table: &str,
    schema: &EntitySchema,
    entity: &E,
    dialect: Dialect,
) -> Result<Statement, BuildError> {
    schema.require_keys()?;
    let version = schema.version_position();
    let mut params = Params::new(dialect);
    let mut assignments = Vec::new();

    for (position, column) in schema.columns().iter().enumerate() {
        if !column.updatable || Some(position) == version {
            continue;
        }
        let value = entity.field_value(column.field);
        let placeholder = params.bind_column(column, &value)?;
        assignments.push(format!("{} = {placeholder}", column.column));
    }

    if assignments.is_empty() {
        return Err(BuildError::EmptySet {
            table: String::from(table),
        });
    }

    let keys = resolve_key(schema, &Key::of(schema, entity))?;
    let mut predicate = key_predicate(&keys, &mut params)?;

    if let Some(column) = schema.version_column() {
        assignments.push(version_increment(column));
        let current = entity.field_value(column.field);
        let placeholder = params.bind_column(column, &current)?;
        predicate.push_str(&format!(" AND {} = {placeholder}", column.column));
    }

    let sql = format!(
        "UPDATE {table} SET {} WHERE {predicate}",
        assignments.join(", ")
    );
    Ok(params.finish(sql))
}
