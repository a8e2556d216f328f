//! Postgres connection over a sqlx pool.

use chrono::{DateTime, NaiveDateTime, Utc};
use oxide_persist_core::{FieldKind, Row, SqlValue, Statement};
use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgPool, PgRow};
use sqlx::query::Query;
use sqlx::{Column as _, Postgres, Row as _, ValueRef as _};
use tracing::debug;

use super::{probe, Connection, Transaction};
use crate::error::{PersistError, Result};

/// A Postgres connection pool.
#[derive(Debug, Clone)]
pub struct PgConnection {
    pool: PgPool,
}

impl PgConnection {
    /// Wraps an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to a database URL.
    pub async fn connect(url: &str) -> Result<Self> {
        Ok(Self::new(PgPool::connect(url).await?))
    }

    /// Returns the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl Connection for PgConnection {
    type Transaction<'c> = PgTransaction;

    fn driver_name(&self) -> &str {
        "postgres"
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

    async fn begin(&self) -> Result<PgTransaction> {
        Ok(PgTransaction {
            tx: self.pool.begin().await?,
        })
    }
}

/// An open Postgres transaction.
pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

impl Transaction for PgTransaction {
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

fn bind_all(statement: &Statement) -> Query<'_, Postgres, PgArguments> {
    statement
        .params
        .iter()
        .fold(sqlx::query(&statement.sql), |query, value| bind_value(query, value))
}

/// Binds a `SqlValue` parameter to a Postgres query.
///
/// Postgres does not cast text parameters to NUMERIC, so fixed-point text is
/// bound as a `NUMERIC` decimal. Text that does not fit a decimal (more than
/// 28 significant digits) is bound as text.
fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &SqlValue,
) -> Query<'q, Postgres, PgArguments> {
    match value.clone() {
        SqlValue::Null => query.bind(Option::<i64>::None),
        SqlValue::TypedNull(kind) => bind_null(query, kind),
        SqlValue::Bool(b) => query.bind(b),
        SqlValue::Int(i) => query.bind(i),
        SqlValue::Float(f) => query.bind(f),
        SqlValue::Numeric(s) => match s.parse::<Decimal>() {
            Ok(d) => query.bind(d),
            Err(_) => query.bind(s),
        },
        SqlValue::Text(s) => query.bind(s),
        SqlValue::Timestamp(ts) => query.bind(ts),
        SqlValue::Blob(b) => query.bind(b),
    }
}

/// Binds a NULL with the parameter type of the column's kind.
///
/// An untyped NULL parameter would be inferred as `bigint`, which Postgres
/// refuses to assign to timestamp, boolean or text columns.
fn bind_null(
    query: Query<'_, Postgres, PgArguments>,
    kind: FieldKind,
) -> Query<'_, Postgres, PgArguments> {
    match kind {
        FieldKind::Bool => query.bind(Option::<bool>::None),
        FieldKind::Int => query.bind(Option::<i64>::None),
        FieldKind::Float => query.bind(Option::<f64>::None),
        FieldKind::Text | FieldKind::Other => query.bind(Option::<String>::None),
        FieldKind::Timestamp => query.bind(Option::<DateTime<Utc>>::None),
        FieldKind::Bytes => query.bind(Option::<Vec<u8>>::None),
    }
}

fn decode_row(row: &PgRow) -> Result<Row> {
    let columns = row.columns().iter().map(|c| c.name().to_string()).collect();
    let values = (0..row.len())
        .map(|index| decode_value(row, index))
        .collect::<Result<Vec<_>>>()?;
    Ok(Row::new(columns, values))
}

fn decode_value(row: &PgRow, index: usize) -> Result<SqlValue> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(SqlValue::Null);
    }
    probe!(
        row,
        index,
        i64 => SqlValue::Int,
        i32 => |v: i32| SqlValue::Int(i64::from(v)),
        i16 => |v: i16| SqlValue::Int(i64::from(v)),
        Decimal => |v: Decimal| SqlValue::Numeric(v.to_string()),
        f64 => SqlValue::Float,
        f32 => |v: f32| SqlValue::Float(f64::from(v)),
        String => SqlValue::Text,
        bool => SqlValue::Bool,
        Vec<u8> => SqlValue::Blob,
        DateTime<Utc> => SqlValue::Timestamp,
        NaiveDateTime => |v: NaiveDateTime| SqlValue::Timestamp(v.and_utc()),
    );
    Err(PersistError::UnexpectedResult(format!(
        "column {index} has an unsupported type"
    )))
}
