//! Write-side facade.
//!
//! Single-row writes go straight to the connection; batch writes run through
//! the transaction executor. Inserts that hit a duplicate key are reported
//! as zero affected rows instead of an error.

use std::collections::HashSet;

use oxide_persist_core::builder::{
    build_delete, build_insert, build_insert_batch, build_patch, build_patch_batch, build_update,
    build_update_batch, key_signature, BatchInsertOptions, InsertChunk, InsertOptions,
};
use oxide_persist_core::{Dialect, Entity, EntitySchema, Key, PatchMap, SqlValue, Statement};
use tracing::{info, warn};

use crate::config::PersistConfig;
use crate::connection::Connection;
use crate::error::Result;
use crate::loader::Loader;
use crate::tx::{execute_batch, execute_with_batch_size, execute_with_lookups};
use crate::version::{next_version, resolve, WriteOutcome};

/// Result of a batch write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Reported affected-row count.
    pub rows_affected: u64,
    /// Input indices that were written.
    pub succeeded: Vec<usize>,
    /// Input indices that were not written.
    pub failed: Vec<usize>,
}

/// Writes entities of type `E` to one table.
pub struct Writer<E, C> {
    loader: Loader<E, C>,
    config: PersistConfig,
}

impl<E: Entity, C: Connection> Writer<E, C> {
    /// Creates a writer, introspecting `E` and identifying the dialect.
    pub fn new(connection: C, table: impl Into<String>) -> Result<Self> {
        Ok(Self {
            loader: Loader::new(connection, table)?,
            config: PersistConfig::default(),
        })
    }

    /// Applies a configuration.
    ///
    /// A `version_field` re-designates the version column.
    pub fn with_config(mut self, config: PersistConfig) -> Result<Self> {
        if let Some(field) = &config.version_field {
            let schema = self.loader.schema().clone().with_version_field(field)?;
            self.loader.replace_schema(schema);
        }
        self.config = config;
        Ok(self)
    }

    /// Returns the loader sharing this writer's connection and schema.
    pub const fn loader(&self) -> &Loader<E, C> {
        &self.loader
    }

    /// Returns the active configuration.
    pub const fn config(&self) -> &PersistConfig {
        &self.config
    }

    fn table(&self) -> &str {
        self.loader.table()
    }

    fn schema(&self) -> &EntitySchema {
        self.loader.schema()
    }

    fn dialect(&self) -> Dialect {
        self.loader.dialect()
    }

    fn connection(&self) -> &C {
        self.loader.connection()
    }

    /// Inserts a row.
    ///
    /// A versioned entity is written with version `1`, which is stored back
    /// into `entity`. A duplicate key returns `Ok(0)`.
    pub async fn insert(&self, entity: &mut E) -> Result<u64> {
        self.insert_with(entity, false).await
    }

    async fn insert_with(&self, entity: &mut E, include_null: bool) -> Result<u64> {
        let statement = build_insert(
            self.table(),
            self.schema(),
            entity,
            self.dialect(),
            InsertOptions { include_null },
        )?;
        let Some(affected) = self.suppress_duplicate(self.connection().execute(&statement).await)?
        else {
            return Ok(0);
        };
        if let Some(version) = self.schema().version_column() {
            entity.set_field_value(version.field, SqlValue::Int(1))?;
        }
        Ok(affected)
    }

    /// Updates a row by key.
    ///
    /// With a version column the update only applies when the stored version
    /// matches `entity`; on success the incremented version is stored back.
    pub async fn update(&self, entity: &mut E) -> Result<WriteOutcome> {
        let statement = build_update(self.table(), self.schema(), entity, self.dialect())?;
        let Some(version) = self.schema().version_column() else {
            return self.unguarded(&statement).await;
        };
        let field = version.field;

        let exists = self
            .loader
            .exists_statement(&Key::of(self.schema(), entity))?;
        let outcome = resolve(self.connection(), &statement, &exists).await?;
        if outcome.is_applied() {
            let next = next_version(entity.field_value(field))?;
            entity.set_field_value(field, next)?;
        }
        Ok(outcome)
    }

    /// Inserts the row if its key is absent, otherwise updates it.
    pub async fn save(&self, entity: &mut E) -> Result<WriteOutcome> {
        if self.loader.exist(Key::of(self.schema(), entity)).await? {
            return self.update(entity).await;
        }
        let affected = self
            .insert_with(entity, self.config.include_null_on_upsert)
            .await?;
        Ok(WriteOutcome::Applied(affected))
    }

    /// Updates the fields named in `patch` on the row addressed by its keys.
    ///
    /// When the patch carries the version field it guards the update the
    /// same way [`Writer::update`] does. The version is incremented either way.
    pub async fn patch(&self, patch: &PatchMap) -> Result<WriteOutcome> {
        let statement = build_patch(self.table(), self.schema(), patch, self.dialect())?;
        let version = self.schema().version_position();
        let guarded = version.is_some()
            && patch.iter().any(|(name, value)| {
                self.schema().external_position(name) == version && !value.is_null()
            });
        if !guarded {
            return self.unguarded(&statement).await;
        }

        let exists = self.loader.exists_statement(&Key::Composite(
            patch.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        ))?;
        resolve(self.connection(), &statement, &exists).await
    }

    /// Deletes the row with the given key.
    pub async fn delete(&self, key: impl Into<Key>) -> Result<u64> {
        let statement = build_delete(self.table(), self.schema(), &key.into(), self.dialect())?;
        self.connection().execute(&statement).await
    }

    async fn unguarded(&self, statement: &Statement) -> Result<WriteOutcome> {
        match self.connection().execute(statement).await? {
            0 => Ok(WriteOutcome::Missing),
            n => Ok(WriteOutcome::Applied(n)),
        }
    }

    fn suppress_duplicate<T>(&self, result: Result<T>) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_duplicate_key(self.dialect()) => {
                warn!(table = %self.table(), error = %err, "Duplicate key, insert skipped");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Inserts rows with multi-row statements inside one transaction.
    ///
    /// Rows are grouped into statements of `batch_size` rows. With
    /// `skip_duplicate` rows whose key exists are skipped by the database
    /// and reported as failed, along with rows repeating the key of an
    /// earlier row; dialects without a native form fail before anything is
    /// written. Without it, a duplicate key rolls the whole batch back and
    /// reports every row as failed.
    pub async fn insert_many(&self, rows: &[E]) -> Result<BatchOutcome> {
        let chunks = build_insert_batch(
            self.table(),
            self.schema(),
            rows,
            self.dialect(),
            BatchInsertOptions {
                skip_duplicate: self.config.skip_duplicate,
                chunk_size: self.config.batch_size,
            },
        )?;
        if self.config.skip_duplicate {
            return self.insert_skipping(rows.len(), &chunks).await;
        }
        let statements: Vec<Statement> = chunks.iter().map(|c| c.statement.clone()).collect();

        let result = execute_batch(self.connection(), &statements, self.config.batch_mode()).await;
        let outcome = match self.suppress_duplicate(result)? {
            Some(report) => BatchOutcome {
                rows_affected: report.rows_affected,
                succeeded: (0..rows.len()).collect(),
                failed: Vec::new(),
            },
            None => BatchOutcome {
                rows_affected: 0,
                succeeded: Vec::new(),
                failed: (0..rows.len()).collect(),
            },
        };
        info!(
            table = %self.table(),
            rows = rows.len(),
            statements = statements.len(),
            affected = outcome.rows_affected,
            "Batch insert finished"
        );
        Ok(outcome)
    }

    async fn insert_skipping(&self, total: usize, chunks: &[InsertChunk]) -> Result<BatchOutcome> {
        let steps: Vec<(Option<Statement>, Statement)> = chunks
            .iter()
            .map(|c| (c.existing.clone(), c.statement.clone()))
            .collect();
        let (report, found) =
            execute_with_lookups(self.connection(), &steps, self.config.batch_mode()).await?;

        let mut seen = HashSet::with_capacity(total);
        let mut outcome = BatchOutcome {
            rows_affected: report.rows_affected,
            ..BatchOutcome::default()
        };
        for (chunk, rows) in chunks.iter().zip(&found) {
            let existing: HashSet<String> =
                rows.iter().map(|row| key_signature(&row.values)).collect();
            for (index, key) in chunk.rows.clone().zip(&chunk.keys) {
                let skipped = key
                    .as_ref()
                    .is_some_and(|key| existing.contains(key) || !seen.insert(key.clone()));
                if skipped {
                    outcome.failed.push(index);
                } else {
                    outcome.succeeded.push(index);
                }
            }
        }
        info!(
            table = %self.table(),
            rows = total,
            skipped = outcome.failed.len(),
            affected = outcome.rows_affected,
            "Batch insert finished"
        );
        Ok(outcome)
    }

    /// Updates rows one statement per row.
    ///
    /// Rows whose update affects nothing (stale version or missing key) are
    /// reported as failed without aborting the batch.
    pub async fn update_many(&self, rows: &[E]) -> Result<BatchOutcome> {
        let statements = build_update_batch(self.table(), self.schema(), rows, self.dialect())?;
        self.run_many(&statements).await
    }

    /// Applies patches one statement per patch.
    pub async fn patch_many(&self, patches: &[PatchMap]) -> Result<BatchOutcome> {
        let statements =
            build_patch_batch(self.table(), self.schema(), patches, self.dialect())?;
        self.run_many(&statements).await
    }

    async fn run_many(&self, statements: &[Statement]) -> Result<BatchOutcome> {
        let report = match self.config.batch_size {
            Some(size) => execute_with_batch_size(self.connection(), statements, size).await?,
            None => execute_batch(self.connection(), statements, self.config.batch_mode()).await?,
        };

        let (succeeded, failed): (Vec<usize>, Vec<usize>) =
            (0..report.counts.len()).partition(|&i| report.counts[i] > 0);
        let rows_affected = if self.config.count_all {
            report.counts.iter().sum()
        } else {
            u64::from(!succeeded.is_empty())
        };
        info!(
            table = %self.table(),
            statements = statements.len(),
            succeeded = succeeded.len(),
            failed = failed.len(),
            "Batch update finished"
        );
        Ok(BatchOutcome {
            rows_affected,
            succeeded,
            failed,
        })
    }
}
