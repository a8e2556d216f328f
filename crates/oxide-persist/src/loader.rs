//! Read-side facade.

use std::marker::PhantomData;
use std::sync::Arc;

use oxide_persist_core::builder::{build_exists, build_load, build_select_all};
use oxide_persist_core::pager::{build_count, build_paged};
use oxide_persist_core::{
    scan_row, scan_rows, Dialect, Entity, EntitySchema, FromSqlValue, Key, Statement,
};
use tracing::debug;

use crate::connection::{identify, Connection};
use crate::error::{PersistError, Result};

/// Builds the WHERE fragment of a search from a filter value.
///
/// The returned statement holds the condition text (without the `WHERE`
/// keyword; empty for no condition) and its parameters, numbered from 1 in
/// the given dialect.
pub type SearchBuilder<F> = Box<dyn Fn(&F, Dialect) -> Statement + Send + Sync>;

/// A reusable search: a condition builder and an optional ordering.
pub struct Search<F> {
    builder: SearchBuilder<F>,
    order_by: Option<String>,
}

impl<F> Search<F> {
    /// Creates a search from a condition builder.
    pub fn new(builder: impl Fn(&F, Dialect) -> Statement + Send + Sync + 'static) -> Self {
        Self {
            builder: Box::new(builder),
            order_by: None,
        }
    }

    /// Sets the `ORDER BY` list, e.g. `"name, id DESC"`.
    #[must_use]
    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }
}

/// Loads entities of type `E` from one table.
pub struct Loader<E, C> {
    connection: C,
    table: String,
    schema: Arc<EntitySchema>,
    dialect: Dialect,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity, C: Connection> Loader<E, C> {
    /// Creates a loader, introspecting `E` and identifying the dialect.
    pub fn new(connection: C, table: impl Into<String>) -> Result<Self> {
        let schema = EntitySchema::introspect::<E>()?;
        Ok(Self::with_schema(connection, table, schema))
    }

    /// Creates a loader with a prepared schema.
    pub fn with_schema(connection: C, table: impl Into<String>, schema: EntitySchema) -> Self {
        let dialect = identify(&connection);
        Self {
            connection,
            table: table.into(),
            schema: Arc::new(schema),
            dialect,
            _entity: PhantomData,
        }
    }

    /// Returns the table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the entity schema.
    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    /// Returns the connection dialect.
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Returns the connection.
    pub const fn connection(&self) -> &C {
        &self.connection
    }

    pub(crate) fn replace_schema(&mut self, schema: EntitySchema) {
        self.schema = Arc::new(schema);
    }

    /// Loads the row with the given key.
    pub async fn load(&self, key: impl Into<Key>) -> Result<Option<E>> {
        let statement = build_load(&self.table, &self.schema, &key.into(), self.dialect)?;
        let rows = self.connection.query(&statement).await?;
        match rows.first() {
            Some(row) => Ok(Some(scan_row(row, &self.schema)?)),
            None => Ok(None),
        }
    }

    /// Returns whether a row with the given key exists.
    pub async fn exist(&self, key: impl Into<Key>) -> Result<bool> {
        let statement = self.exists_statement(&key.into())?;
        Ok(!self.connection.query(&statement).await?.is_empty())
    }

    pub(crate) fn exists_statement(&self, key: &Key) -> Result<Statement> {
        Ok(build_exists(&self.table, &self.schema, key, self.dialect)?)
    }

    /// Loads every row of the table.
    pub async fn all(&self) -> Result<Vec<E>> {
        let statement = build_select_all(&self.table, &self.schema);
        let rows = self.connection.query(&statement).await?;
        Ok(scan_rows(&rows, &self.schema)?)
    }

    /// Runs a search and returns the total match count with one page of rows.
    ///
    /// A non-positive `limit` returns every match.
    pub async fn search<F>(
        &self,
        search: &Search<F>,
        filter: &F,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<E>)> {
        let condition = (search.builder)(filter, self.dialect);
        let mut sql = build_select_all(&self.table, &self.schema).sql;
        if !condition.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&condition.sql);
        }
        if let Some(order_by) = &search.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order_by);
        }

        let count = Statement::new(build_count(&sql), condition.params.clone());
        let total = match self.connection.query(&count).await?.first().and_then(|r| r.first()) {
            Some(value) => i64::from_sql_value(value.clone())?,
            None => {
                return Err(PersistError::UnexpectedResult(String::from(
                    "count query returned no rows",
                )))
            }
        };

        let page = Statement::new(
            build_paged(&sql, limit, offset, self.dialect),
            condition.params,
        );
        let rows = self.connection.query(&page).await?;
        debug!(table = %self.table, total, returned = rows.len(), "Search complete");
        Ok((total, scan_rows(&rows, &self.schema)?))
    }
}
