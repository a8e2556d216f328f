//! Optimistic-lock coordination.
//!
//! A versioned UPDATE matches on key and current version. When it affects no
//! rows, an existence check on the key tells a stale version (the row is
//! there) from a missing row.

use oxide_persist_core::{FromSqlValue, SqlValue, Statement};
use tracing::warn;

use crate::connection::Connection;
use crate::error::Result;

/// Result of a single-row write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The write affected this many rows.
    Applied(u64),
    /// The row exists but carries a different version.
    Conflict,
    /// No row has the key.
    Missing,
}

impl WriteOutcome {
    /// Returns the conventional count: `n`, `-1` for a conflict, `0` when missing.
    #[must_use]
    pub fn rows_affected(self) -> i64 {
        match self {
            Self::Applied(n) => i64::try_from(n).unwrap_or(i64::MAX),
            Self::Conflict => -1,
            Self::Missing => 0,
        }
    }

    /// Returns whether the write was applied.
    #[must_use]
    pub const fn is_applied(self) -> bool {
        matches!(self, Self::Applied(n) if n > 0)
    }

    /// Returns whether the write lost an optimistic-lock race.
    #[must_use]
    pub const fn is_conflict(self) -> bool {
        matches!(self, Self::Conflict)
    }
}

impl From<WriteOutcome> for i64 {
    fn from(outcome: WriteOutcome) -> Self {
        outcome.rows_affected()
    }
}

/// Executes a versioned write and classifies a zero-row result.
///
/// `exists` must select the row by key only.
pub async fn resolve<C: Connection>(
    connection: &C,
    statement: &Statement,
    exists: &Statement,
) -> Result<WriteOutcome> {
    let affected = connection.execute(statement).await?;
    if affected > 0 {
        return Ok(WriteOutcome::Applied(affected));
    }
    if connection.query(exists).await?.is_empty() {
        return Ok(WriteOutcome::Missing);
    }
    warn!(sql = %statement.sql, "Version conflict");
    Ok(WriteOutcome::Conflict)
}

/// Returns the version following `current`.
pub(crate) fn next_version(current: SqlValue) -> Result<SqlValue> {
    let current = i64::from_sql_value(current)?;
    Ok(SqlValue::Int(current.saturating_add(1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_affected_convention() {
        assert_eq!(WriteOutcome::Applied(3).rows_affected(), 3);
        assert_eq!(WriteOutcome::Conflict.rows_affected(), -1);
        assert_eq!(WriteOutcome::Missing.rows_affected(), 0);
        assert_eq!(i64::from(WriteOutcome::Conflict), -1);
        assert!(WriteOutcome::Applied(1).is_applied());
        assert!(!WriteOutcome::Applied(0).is_applied());
        assert!(WriteOutcome::Conflict.is_conflict());
    }

    #[test]
    fn test_next_version() {
        assert_eq!(next_version(SqlValue::Int(1)).unwrap(), SqlValue::Int(2));
        assert_eq!(
            next_version(SqlValue::Text("7".into())).unwrap(),
            SqlValue::Int(8)
        );
        assert!(next_version(SqlValue::Blob(vec![])).is_err());
    }
}
