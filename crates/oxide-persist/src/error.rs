//! Error types for the persistence runtime.

use oxide_persist_core::{BuildError, Dialect, ScanError, SchemaError, ValueError};
use thiserror::Error;

/// Errors raised while building or executing statements.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The entity type cannot be mapped.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A statement could not be generated.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// A result row could not be mapped back.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// A value could not be converted.
    #[error(transparent)]
    Value(#[from] ValueError),

    /// Invalid configuration document.
    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),

    /// A statement inside a transaction failed; the transaction was rolled back.
    #[error("statement {index} failed: {source}")]
    Statement {
        /// Position of the failing statement.
        index: usize,
        /// Underlying error.
        source: Box<PersistError>,
    },

    /// The first statement of a batch affected no rows.
    #[error("first statement of the batch affected no rows")]
    FirstRowRejected,

    /// Rolling back after a failure failed as well.
    #[error("rollback failed: {rollback} (after: {cause})")]
    Rollback {
        /// Error returned by the rollback.
        #[source]
        rollback: Box<PersistError>,
        /// Error that triggered the rollback.
        cause: Box<PersistError>,
    },

    /// A chunked batch failed after earlier chunks were committed.
    #[error("batch failed after {rows_affected} rows: {source}")]
    Batch {
        /// Rows affected by the committed part.
        rows_affected: u64,
        /// Input indices that were committed.
        succeeded: Vec<usize>,
        /// Input indices that were not committed.
        failed: Vec<usize>,
        /// Error that stopped the batch.
        source: Box<PersistError>,
    },

    /// The database returned something the caller did not expect.
    #[error("unexpected result: {0}")]
    UnexpectedResult(String),
}

impl PersistError {
    /// Returns the innermost error, looking through statement and batch wrappers.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Statement { source, .. } | Self::Batch { source, .. } => source.root(),
            Self::Rollback { cause, .. } => cause.root(),
            other => other,
        }
    }

    /// Returns whether the error reports a duplicate key on `dialect`.
    #[must_use]
    pub fn is_duplicate_key(&self, dialect: Dialect) -> bool {
        match self.root() {
            Self::Database(err) => dialect.is_duplicate_key(&err.to_string()),
            _ => false,
        }
    }

    /// Returns whether the dialect lacks syntax for the requested operation.
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self.root(), Self::Build(BuildError::Unsupported { .. }))
    }

    pub(crate) fn at(index: usize, source: Self) -> Self {
        Self::Statement {
            index,
            source: Box::new(source),
        }
    }
}

/// Result type alias for persistence operations.
pub type Result<T> = std::result::Result<T, PersistError>;
