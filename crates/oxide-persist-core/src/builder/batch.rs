//! Multi-row statements.
//!
//! Inserts are grouped into chunks with one multi-row statement per chunk.
//! Updates and patches have no portable multi-row form and produce one
//! statement per row; the runtime runs them inside a single transaction.

use std::ops::Range;

use super::{build_patch, build_update, Params, PatchMap, Statement};
use crate::codec::{column_literal, column_parameter};
use crate::dialect::{Dialect, SkipDuplicateStyle};
use crate::error::BuildError;
use crate::schema::{ColumnDescriptor, Entity, EntitySchema};
use crate::value::SqlValue;

/// Options for [`build_insert_batch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchInsertOptions {
    /// Silently skip rows whose key already exists.
    pub skip_duplicate: bool,
    /// Maximum rows per statement; `None` or `0` puts every row in one chunk.
    pub chunk_size: Option<usize>,
}

/// One multi-row INSERT and the input rows it covers.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertChunk {
    /// Indices into the input slice.
    pub rows: Range<usize>,
    /// The statement inserting those rows.
    pub statement: Statement,
    /// Query returning the keys among those rows that already exist. Built
    /// only when skipping duplicates on a keyed schema.
    pub existing: Option<Statement>,
    /// [`key_signature`] of each row's key; `None` when skipping is off or a
    /// key part is NULL.
    pub keys: Vec<Option<String>>,
}

/// Builds chunked multi-row inserts.
///
/// Every insertable column is written for every row so that all value
/// tuples line up; absent optional fields become `NULL`. Values are embedded
/// as literals when the codec allows it and bound otherwise. The version
/// column, if any, is written as `1`.
///
/// With `skip_duplicate` the statement is rewritten for the dialect; engines
/// without a native form fail with [`BuildError::Unsupported`] before any
/// statement is produced. Each chunk then also carries a lookup of its
/// already stored keys, so the caller can tell skipped rows from inserted
/// ones.
pub fn build_insert_batch<E: Entity>(
    table: &str,
    schema: &EntitySchema,
    rows: &[E],
    dialect: Dialect,
    options: BatchInsertOptions,
) -> Result<Vec<InsertChunk>, BuildError> {
    let style = if options.skip_duplicate {
        let style = dialect.skip_duplicate_style();
        if style == SkipDuplicateStyle::Unsupported {
            return Err(BuildError::Unsupported {
                operation: "skip duplicate insert",
                dialect: dialect.name(),
            });
        }
        Some(style)
    } else {
        None
    };

    let columns: Vec<&ColumnDescriptor> =
        schema.columns().iter().filter(|c| c.insertable).collect();
    if columns.is_empty() {
        return Err(BuildError::EmptyInsert {
            table: String::from(table),
        });
    }
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let column_list = columns
        .iter()
        .map(|c| c.column.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let conflict_target = match style {
        Some(SkipDuplicateStyle::OnDuplicateKeyUpdate) => {
            schema.require_keys()?;
            schema.key_columns().next().map(|c| c.column.as_str())
        }
        _ => None,
    };

    let size = options.chunk_size.filter(|&n| n > 0).unwrap_or(rows.len());
    let mut chunks = Vec::with_capacity(rows.len().div_ceil(size));
    let mut start = 0;
    while start < rows.len() {
        let end = (start + size).min(rows.len());
        let mut params = Params::new(dialect);
        let mut tuples = Vec::with_capacity(end - start);
        for row in &rows[start..end] {
            tuples.push(value_tuple(schema, &columns, row, dialect, &mut params)?);
        }

        let sql = if dialect.supports_multi_row_values() {
            let verb = match style {
                Some(SkipDuplicateStyle::InsertOrIgnore) => "INSERT OR IGNORE INTO",
                _ => "INSERT INTO",
            };
            let mut sql = format!("{verb} {table} ({column_list}) VALUES {}", tuples.join(", "));
            match (style, conflict_target) {
                (Some(SkipDuplicateStyle::OnConflictDoNothing), _) => {
                    sql.push_str(" ON CONFLICT DO NOTHING");
                }
                (Some(SkipDuplicateStyle::OnDuplicateKeyUpdate), Some(key)) => {
                    sql.push_str(&format!(" ON DUPLICATE KEY UPDATE {key} = {key}"));
                }
                _ => {}
            }
            sql
        } else {
            let intos = tuples
                .iter()
                .map(|t| format!("INTO {table} ({column_list}) VALUES {t}"))
                .collect::<Vec<_>>()
                .join(" ");
            format!("INSERT ALL {intos} SELECT 1 FROM DUAL")
        };

        let (existing, keys) = if style.is_some() && schema.key_count() > 0 {
            existing_keys(table, schema, &rows[start..end], dialect)?
        } else {
            (None, vec![None; end - start])
        };
        chunks.push(InsertChunk {
            rows: start..end,
            statement: params.finish(sql),
            existing,
            keys,
        });
        start = end;
    }
    Ok(chunks)
}

fn value_tuple<E: Entity>(
    schema: &EntitySchema,
    columns: &[&ColumnDescriptor],
    row: &E,
    dialect: Dialect,
    params: &mut Params,
) -> Result<String, BuildError> {
    let version = schema.version_column().map(|c| c.field);
    let mut values = Vec::with_capacity(columns.len());
    for column in columns {
        let value = if Some(column.field) == version {
            SqlValue::Int(1)
        } else {
            row.field_value(column.field)
        };
        let rendered = match column_literal(column, &value, dialect) {
            Some(literal) => literal,
            None => params.bind_column(column, &value)?,
        };
        values.push(rendered);
    }
    Ok(format!("({})", values.join(", ")))
}

/// Renders key values as comparable text.
///
/// An entity's key (after the codec) and the same key read back from the
/// database yield the same signature.
#[must_use]
pub fn key_signature(values: &[SqlValue]) -> String {
    values
        .iter()
        .map(|value| match value {
            SqlValue::Int(i) => i.to_string(),
            SqlValue::Numeric(s) | SqlValue::Text(s) => s.clone(),
            SqlValue::Bool(b) => i64::from(*b).to_string(),
            other => other.to_sql_inline(),
        })
        .collect::<Vec<_>>()
        .join("\u{1f}")
}

/// Builds `SELECT <keys> FROM <table> WHERE <key matches any row>` and the
/// signature of every row's key.
fn existing_keys<E: Entity>(
    table: &str,
    schema: &EntitySchema,
    rows: &[E],
    dialect: Dialect,
) -> Result<(Option<Statement>, Vec<Option<String>>), BuildError> {
    let keys: Vec<&ColumnDescriptor> = schema.key_columns().collect();
    let mut params = Params::new(dialect);
    let mut signatures = Vec::with_capacity(rows.len());
    let mut matches = Vec::with_capacity(rows.len());

    for row in rows {
        let values: Vec<SqlValue> = keys.iter().map(|c| row.field_value(c.field)).collect();
        if values.iter().any(SqlValue::is_null) {
            signatures.push(None);
            continue;
        }
        let stored = keys
            .iter()
            .zip(&values)
            .map(|(column, value)| {
                column_parameter(column, value)
                    .ok_or_else(|| BuildError::Unrepresentable(column.column.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        signatures.push(Some(key_signature(&stored)));

        let placeholders: Vec<String> = stored.into_iter().map(|v| params.bind(v)).collect();
        matches.push(if keys.len() == 1 {
            placeholders.concat()
        } else {
            let parts = keys
                .iter()
                .zip(&placeholders)
                .map(|(column, placeholder)| format!("{} = {placeholder}", column.column))
                .collect::<Vec<_>>();
            format!("({})", parts.join(" AND "))
        });
    }

    if matches.is_empty() {
        return Ok((None, signatures));
    }
    let select = keys
        .iter()
        .map(|c| c.column.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let sql = if keys.len() == 1 {
        format!(
            "SELECT {select} FROM {table} WHERE {select} IN ({})",
            matches.join(", ")
        )
    } else {
        format!("SELECT {select} FROM {table} WHERE {}", matches.join(" OR "))
    };
    Ok((Some(params.finish(sql)), signatures))
}

/// Builds one versioned UPDATE per row, in input order.
pub fn build_update_batch<E: Entity>(
    table: &str,
    schema: &EntitySchema,
    rows: &[E],
    dialect: Dialect,
) -> Result<Vec<Statement>, BuildError> {
    rows.iter()
        .map(|row| build_update(table, schema, row, dialect))
        .collect()
}

/// Builds one patch UPDATE per map, in input order.
pub fn build_patch_batch(
    table: &str,
    schema: &EntitySchema,
    patches: &[PatchMap],
    dialect: Dialect,
) -> Result<Vec<Statement>, BuildError> {
    patches
        .iter()
        .map(|patch| build_patch(table, schema, patch, dialect))
        .collect()
}
