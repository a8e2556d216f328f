//! MySQL connection over a sqlx pool.

use chrono::{DateTime, NaiveDateTime, Utc};
use oxide_persist_core::{FieldKind, Row, SqlValue, Statement};
use rust_decimal::Decimal;
use sqlx::mysql::{MySqlArguments, MySqlPool, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column as _, MySql, Row as _, ValueRef as _};
use tracing::debug;

use super::{probe, Connection, Transaction};
use crate::error::{PersistError, Result};

/// A MySQL connection pool.
#[derive(Debug, Clone)]
pub struct MySqlConnection {
    pool: MySqlPool,
}

impl MySqlConnection {
    /// Wraps an existing pool.
    #[must_use]
    pub const fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Connects to a database URL.
    pub async fn connect(url: &str) -> Result<Self> {
        Ok(Self::new(MySqlPool::connect(url).await?))
    }
}

impl Connection for MySqlConnection {
    type Transaction<'c> = MySqlTransaction;

    fn driver_name(&self) -> &str {
        "mysql"
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

    async fn begin(&self) -> Result<MySqlTransaction> {
        Ok(MySqlTransaction {
            tx: self.pool.begin().await?,
        })
    }
}

/// An open MySQL transaction.
pub struct MySqlTransaction {
    tx: sqlx::Transaction<'static, MySql>,
}

impl Transaction for MySqlTransaction {
    async fn execute(&mut self, statement: &Statement) -> Result<u64> {
        let result = bind_all(statement).execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    async fn query(&mut self, statement: &Statement) -> Result<Vec<Row>> {
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

fn bind_all(statement: &Statement) -> Query<'_, MySql, MySqlArguments> {
    statement
        .params
        .iter()
        .fold(sqlx::query(&statement.sql), |query, value| bind_value(query, value))
}

/// Binds a `SqlValue` parameter to a MySQL query.
///
/// Fixed-point text binds as `DECIMAL` when it fits one, and as text
/// otherwise.
fn bind_value<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &SqlValue,
) -> Query<'q, MySql, MySqlArguments> {
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

fn bind_null(
    query: Query<'_, MySql, MySqlArguments>,
    kind: FieldKind,
) -> Query<'_, MySql, MySqlArguments> {
    match kind {
        FieldKind::Bool => query.bind(Option::<bool>::None),
        FieldKind::Int => query.bind(Option::<i64>::None),
        FieldKind::Float => query.bind(Option::<f64>::None),
        FieldKind::Text | FieldKind::Other => query.bind(Option::<String>::None),
        FieldKind::Timestamp => query.bind(Option::<DateTime<Utc>>::None),
        FieldKind::Bytes => query.bind(Option::<Vec<u8>>::None),
    }
}

fn decode_row(row: &MySqlRow) -> Result<Row> {
    let columns = row.columns().iter().map(|c| c.name().to_string()).collect();
    let values = (0..row.len())
        .map(|index| decode_value(row, index))
        .collect::<Result<Vec<_>>>()?;
    Ok(Row::new(columns, values))
}

fn decode_value(row: &MySqlRow, index: usize) -> Result<SqlValue> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(SqlValue::Null);
    }
    probe!(
        row,
        index,
        i64 => SqlValue::Int,
        u64 => |v: u64| i64::try_from(v).map_or_else(|_| SqlValue::Numeric(v.to_string()), SqlValue::Int),
        Decimal => |v: Decimal| SqlValue::Numeric(v.to_string()),
        f64 => SqlValue::Float,
        String => SqlValue::Text,
        Vec<u8> => SqlValue::Blob,
        bool => SqlValue::Bool,
        DateTime<Utc> => SqlValue::Timestamp,
        NaiveDateTime => |v: NaiveDateTime| SqlValue::Timestamp(v.and_utc()),
    );
    Err(PersistError::UnexpectedResult(format!(
        "column {index} has an unsupported type"
    )))
}
