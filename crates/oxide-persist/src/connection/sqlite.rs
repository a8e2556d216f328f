//! SQLite connection over a sqlx pool.

use chrono::{DateTime, Utc};
use oxide_persist_core::{Row, SqlValue, Statement};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqlitePool, SqliteRow};
use sqlx::{Column as _, Row as _, Sqlite, ValueRef as _};
use tracing::debug;

use super::{probe, Connection, Transaction};
use crate::error::{PersistError, Result};

/// A SQLite connection pool.
#[derive(Debug, Clone)]
pub struct SqliteConnection {
    pool: SqlitePool,
}

impl SqliteConnection {
    /// Wraps an existing pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connects to a database URL.
    pub async fn connect(url: &str) -> Result<Self> {
        Ok(Self::new(SqlitePool::connect(url).await?))
    }

    /// Returns the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl Connection for SqliteConnection {
    type Transaction<'c> = SqliteTransaction;

    fn driver_name(&self) -> &str {
        "sqlite"
    }

    async fn execute(&self, statement: &Statement) -> Result<u64> {
        debug!(sql = %statement.sql, params = statement.params.len(), "Executing statement");
        let result = bind_all(statement).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn query(&self, statement: &Statement) -> Result<Vec<Row>> {
        debug!(sql = %statement.sql, params = statement.params.len(), "Running query");
        let rows = bind_all(statement).fetch_all(&self.pool).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn begin(&self) -> Result<SqliteTransaction> {
        Ok(SqliteTransaction {
            tx: self.pool.begin().await?,
        })
    }
}

/// An open SQLite transaction.
pub struct SqliteTransaction {
    tx: sqlx::Transaction<'static, Sqlite>,
}

impl Transaction for SqliteTransaction {
    async fn execute(&mut self, statement: &Statement) -> Result<u64> {
        debug!(sql = %statement.sql, params = statement.params.len(), "Executing statement in transaction");
        let result = bind_all(statement).execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    async fn query(&mut self, statement: &Statement) -> Result<Vec<Row>> {
        debug!(sql = %statement.sql, params = statement.params.len(), "Running query in transaction");
        let rows = bind_all(statement).fetch_all(&mut *self.tx).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn commit(self) -> Result<()> {
        Ok(self.tx.commit().await?)
    }

    async fn rollback(self) -> Result<()> {
        Ok(self.tx.rollback().await?)
    }
}

fn bind_all(statement: &Statement) -> Query<'_, Sqlite, SqliteArguments<'_>> {
    statement
        .params
        .iter()
        .fold(sqlx::query(&statement.sql), |query, value| bind_value(query, value))
}

/// Binds a `SqlValue` parameter to a SQLite query.
fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &SqlValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value.clone() {
        SqlValue::Null | SqlValue::TypedNull(_) => query.bind(Option::<i64>::None),
        SqlValue::Bool(b) => query.bind(b),
        SqlValue::Int(i) => query.bind(i),
        SqlValue::Float(f) => query.bind(f),
        SqlValue::Numeric(s) | SqlValue::Text(s) => query.bind(s),
        SqlValue::Timestamp(ts) => query.bind(ts),
        SqlValue::Blob(b) => query.bind(b),
    }
}

fn decode_row(row: &SqliteRow) -> Result<Row> {
    let columns = row.columns().iter().map(|c| c.name().to_string()).collect();
    let values = (0..row.len())
        .map(|index| decode_value(row, index))
        .collect::<Result<Vec<_>>>()?;
    Ok(Row::new(columns, values))
}

fn decode_value(row: &SqliteRow, index: usize) -> Result<SqlValue> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(SqlValue::Null);
    }
    probe!(
        row,
        index,
        i64 => SqlValue::Int,
        f64 => SqlValue::Float,
        String => SqlValue::Text,
        Vec<u8> => SqlValue::Blob,
        bool => SqlValue::Bool,
        DateTime<Utc> => SqlValue::Timestamp,
    );
    Err(PersistError::UnexpectedResult(format!(
        "column {index} has an unsupported type"
    )))
}
