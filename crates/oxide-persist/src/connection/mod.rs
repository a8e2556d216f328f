//! Connections the writer and loader run against.
//!
//! A [`Connection`] executes statements outside a transaction and opens
//! [`Transaction`]s. Both speak in core [`Statement`]s and [`Row`]s, so the
//! facades never see driver types. Implementations exist for sqlx's SQLite
//! pool and, behind the `postgres` and `mysql` features, its Postgres and
//! MySQL pools.

#[cfg(feature = "mysql")]
mod mysql;
#[cfg(feature = "postgres")]
mod postgres;
#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "mysql")]
pub use mysql::{MySqlConnection, MySqlTransaction};
#[cfg(feature = "postgres")]
pub use postgres::{PgConnection, PgTransaction};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteConnection, SqliteTransaction};

use oxide_persist_core::{Dialect, Row, Statement};

use crate::error::Result;

/// A handle statements run against, outside of any transaction.
#[allow(async_fn_in_trait)]
pub trait Connection {
    /// Transaction type opened by [`Connection::begin`].
    type Transaction<'c>: Transaction
    where
        Self: 'c;

    /// Returns the driver name used to identify the dialect.
    fn driver_name(&self) -> &str;

    /// Executes a statement and returns the number of affected rows.
    async fn execute(&self, statement: &Statement) -> Result<u64>;

    /// Runs a query and returns every row.
    async fn query(&self, statement: &Statement) -> Result<Vec<Row>>;

    /// Opens a transaction.
    async fn begin(&self) -> Result<Self::Transaction<'_>>;
}

/// An open transaction.
///
/// Dropping a transaction without committing rolls it back.
#[allow(async_fn_in_trait)]
pub trait Transaction {
    /// Executes a statement and returns the number of affected rows.
    async fn execute(&mut self, statement: &Statement) -> Result<u64>;

    /// Runs a query and returns every row.
    async fn query(&mut self, statement: &Statement) -> Result<Vec<Row>>;

    /// Commits the transaction.
    async fn commit(self) -> Result<()>;

    /// Rolls the transaction back.
    async fn rollback(self) -> Result<()>;
}

/// Identifies the dialect of a connection from its driver name.
pub fn identify<C: Connection>(connection: &C) -> Dialect {
    Dialect::for_driver(connection.driver_name())
}

/// Tries each listed Rust type in order and wraps the first that decodes.
macro_rules! probe {
    ($row:expr, $index:expr, $($ty:ty => $wrap:expr),+ $(,)?) => {
        $(
            if let Ok(value) = sqlx::Row::try_get::<$ty, _>($row, $index) {
                return Ok($wrap(value));
            }
        )+
    };
}

#[allow(unused_imports)]
pub(crate) use probe;
