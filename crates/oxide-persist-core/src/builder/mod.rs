//! Statement builder.
//!
//! Pure functions turning an entity (or a sparse patch) plus its
//! [`EntitySchema`] into a [`Statement`]: SQL text with dialect placeholders
//! and the ordered parameter list.
//!
//! # Example
//!
//! ```ignore
//! use oxide_persist_core::builder::{build_update, Statement};
//! use oxide_persist_core::{Dialect, EntitySchema};
//!
//! let schema = EntitySchema::introspect::<User>()?.with_version_field("version")?;
//! let Statement { sql, params } = build_update("users", &schema, &user, Dialect::Postgres)?;
//! // UPDATE users SET user_name = $1, version = version + 1 WHERE id = $2 AND version = $3
//! ```

mod batch;
mod delete;
mod insert;
mod patch;
mod update;

pub use batch::{
    build_insert_batch, build_patch_batch, build_update_batch, key_signature, BatchInsertOptions,
    InsertChunk,
};
pub use delete::{build_delete, build_exists, build_load, build_select_all};
pub use insert::{build_insert, InsertOptions};
pub use patch::{build_patch, PatchMap};
pub use update::build_update;

use crate::codec::column_parameter;
use crate::dialect::Dialect;
use crate::error::BuildError;
use crate::schema::{ColumnDescriptor, Entity, EntitySchema};
use crate::value::{SqlValue, ToSqlValue};

/// A generated statement: SQL text and its ordered parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statement {
    /// SQL text.
    pub sql: String,
    /// Parameters in placeholder order.
    pub params: Vec<SqlValue>,
}

impl Statement {
    /// Creates a statement.
    #[must_use]
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Creates a statement without parameters.
    #[must_use]
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::new(sql, Vec::new())
    }

    /// Returns whether the SQL text is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sql.trim().is_empty()
    }
}

/// A primary key value: a single value or named parts of a composite key.
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    /// Value of the only key column.
    Single(SqlValue),
    /// `(name, value)` pairs; names are external or column names.
    Composite(Vec<(String, SqlValue)>),
}

impl Key {
    /// Creates a composite key.
    #[must_use]
    pub fn composite<V: ToSqlValue + Clone>(parts: &[(&str, V)]) -> Self {
        Self::Composite(
            parts
                .iter()
                .map(|(name, value)| (String::from(*name), value.clone().to_sql_value()))
                .collect(),
        )
    }

    /// Reads the key of an entity.
    #[must_use]
    pub fn of<E: Entity>(schema: &EntitySchema, entity: &E) -> Self {
        Self::Composite(
            schema
                .key_columns()
                .map(|c| (c.column.clone(), entity.field_value(c.field)))
                .collect(),
        )
    }
}

macro_rules! key_from {
    ($($ty:ty),+) => {
        $(
            impl From<$ty> for Key {
                fn from(value: $ty) -> Self {
                    Self::Single(value.to_sql_value())
                }
            }
        )+
    };
}

key_from!(SqlValue, i32, i64, u32, u64, String, &str);

impl From<Vec<(String, SqlValue)>> for Key {
    fn from(parts: Vec<(String, SqlValue)>) -> Self {
        Self::Composite(parts)
    }
}

/// Accumulates parameters and hands out dialect placeholders.
#[derive(Debug)]
pub(crate) struct Params {
    dialect: Dialect,
    values: Vec<SqlValue>,
}

impl Params {
    pub(crate) const fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            values: Vec::new(),
        }
    }

    /// Binds a value and returns its placeholder.
    pub(crate) fn bind(&mut self, value: SqlValue) -> String {
        self.values.push(value);
        self.dialect.placeholder(self.values.len())
    }

    /// Binds a column value through the codec.
    pub(crate) fn bind_column(
        &mut self,
        column: &ColumnDescriptor,
        value: &SqlValue,
    ) -> Result<String, BuildError> {
        let param = column_parameter(column, value)
            .ok_or_else(|| BuildError::Unrepresentable(column.column.clone()))?;
        Ok(self.bind(param))
    }

    pub(crate) fn finish(self, sql: String) -> Statement {
        Statement::new(sql, self.values)
    }
}

/// Resolves a key against the schema's key columns, in key order.
pub(crate) fn resolve_key<'s>(
    schema: &'s EntitySchema,
    key: &Key,
) -> Result<Vec<(&'s ColumnDescriptor, SqlValue)>, BuildError> {
    schema.require_keys()?;
    match key {
        Key::Single(value) => {
            if schema.key_count() != 1 {
                return Err(BuildError::KeyArity {
                    expected: schema.key_count(),
                    actual: 1,
                });
            }
            Ok(schema.key_columns().map(|c| (c, value.clone())).collect())
        }
        Key::Composite(parts) => schema
            .key_columns()
            .map(|c| {
                parts
                    .iter()
                    .find(|(name, _)| {
                        name == &c.external
                            || name == &c.name
                            || name.eq_ignore_ascii_case(&c.column)
                    })
                    .map(|(_, value)| (c, value.clone()))
                    .ok_or_else(|| BuildError::MissingKey(c.external.clone()))
            })
            .collect(),
    }
}

/// Renders `k1 = ? AND k2 = ?`, binding the key values.
pub(crate) fn key_predicate(
    keys: &[(&ColumnDescriptor, SqlValue)],
    params: &mut Params,
) -> Result<String, BuildError> {
    let mut parts = Vec::with_capacity(keys.len());
    for (column, value) in keys {
        if value.is_null() {
            return Err(BuildError::MissingKey(column.external.clone()));
        }
        let placeholder = params.bind_column(column, value)?;
        parts.push(format!("{} = {placeholder}", column.column));
    }
    Ok(parts.join(" AND "))
}

/// Renders `version = version + 1` for the version column.
pub(crate) fn version_increment(column: &ColumnDescriptor) -> String {
    format!("{col} = {col} + 1", col = column.column)
}
