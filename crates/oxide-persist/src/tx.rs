//! Transaction executor.
//!
//! Runs ordered statement lists inside a single transaction: the first
//! failure rolls back immediately and nothing is committed. Chunked
//! execution commits fixed-size groups one after another and stops at the
//! first failing group.

use oxide_persist_core::{Row, Statement};
use tracing::{info, warn};

use crate::connection::{Connection, Transaction};
use crate::error::{PersistError, Result};

/// Options for [`execute_batch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchMode {
    /// Abort and roll back when the first statement affects no rows.
    pub first_row_must_succeed: bool,
    /// Report the sum of affected rows; otherwise report `1` on success.
    pub count_all: bool,
}

impl Default for BatchMode {
    fn default() -> Self {
        Self {
            first_row_must_succeed: false,
            count_all: true,
        }
    }
}

/// Counts reported by a committed batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxReport {
    /// Rows affected by each statement, in input order.
    pub counts: Vec<u64>,
    /// Reported total.
    pub rows_affected: u64,
}

impl TxReport {
    fn new(counts: Vec<u64>, mode: BatchMode) -> Self {
        let rows_affected = if mode.count_all {
            counts.iter().sum()
        } else {
            u64::from(!counts.is_empty())
        };
        Self {
            counts,
            rows_affected,
        }
    }
}

/// An optional lookup query and the statement it precedes.
type Step<'s> = (Option<&'s Statement>, &'s Statement);

/// Executes every statement in one transaction.
///
/// Returns the per-statement counts once committed. On the first failure the
/// transaction is rolled back and the error names the failing statement.
pub async fn execute_all<C: Connection>(
    connection: &C,
    statements: &[Statement],
) -> Result<Vec<u64>> {
    let steps: Vec<Step<'_>> = statements.iter().map(|s| (None, s)).collect();
    run(connection, &steps, false).await.map(|(counts, _)| counts)
}

/// Executes every statement in one transaction with batch options.
pub async fn execute_batch<C: Connection>(
    connection: &C,
    statements: &[Statement],
    mode: BatchMode,
) -> Result<TxReport> {
    let steps: Vec<Step<'_>> = statements.iter().map(|s| (None, s)).collect();
    let (counts, _) = run(connection, &steps, mode.first_row_must_succeed).await?;
    Ok(TxReport::new(counts, mode))
}

/// Executes statements in one transaction, each preceded by its lookup.
///
/// A lookup runs inside the same transaction right before its statement;
/// the rows every lookup returned come back in input order (empty for
/// steps without one). Any failure rolls everything back.
pub async fn execute_with_lookups<C: Connection>(
    connection: &C,
    steps: &[(Option<Statement>, Statement)],
    mode: BatchMode,
) -> Result<(TxReport, Vec<Vec<Row>>)> {
    let steps: Vec<Step<'_>> = steps
        .iter()
        .map(|(lookup, statement)| (lookup.as_ref(), statement))
        .collect();
    let (counts, found) = run(connection, &steps, mode.first_row_must_succeed).await?;
    Ok((TxReport::new(counts, mode), found))
}

/// Executes statements in groups of `size`, one transaction per group.
///
/// A `size` of zero runs everything as one group. When a group fails, the
/// groups before it stay committed and the error is a
/// [`PersistError::Batch`] carrying the committed count and statement
/// indices.
pub async fn execute_with_batch_size<C: Connection>(
    connection: &C,
    statements: &[Statement],
    size: usize,
) -> Result<TxReport> {
    let size = if size == 0 {
        statements.len().max(1)
    } else {
        size
    };

    let mut report = TxReport::default();
    for (group, chunk) in statements.chunks(size).enumerate() {
        let start = group * size;
        match execute_all(connection, chunk).await {
            Ok(counts) => {
                report.rows_affected += counts.iter().sum::<u64>();
                report.counts.extend(counts);
            }
            Err(err) => {
                let err = match err {
                    PersistError::Statement { index, source } => PersistError::Statement {
                        index: start + index,
                        source,
                    },
                    other => other,
                };
                warn!(
                    committed = start,
                    total = statements.len(),
                    error = %err,
                    "Chunked batch stopped"
                );
                return Err(PersistError::Batch {
                    rows_affected: report.rows_affected,
                    succeeded: (0..start).collect(),
                    failed: (start..statements.len()).collect(),
                    source: Box::new(err),
                });
            }
        }
    }

    info!(
        statements = statements.len(),
        rows = report.rows_affected,
        "Chunked batch committed"
    );
    Ok(report)
}

async fn run<C: Connection>(
    connection: &C,
    steps: &[Step<'_>],
    first_row_must_succeed: bool,
) -> Result<(Vec<u64>, Vec<Vec<Row>>)> {
    if steps.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }

    let mut tx = connection.begin().await?;
    let mut counts = Vec::with_capacity(steps.len());
    let mut found = Vec::with_capacity(steps.len());
    for (index, (lookup, statement)) in steps.iter().enumerate() {
        if let Some(lookup) = lookup {
            match tx.query(lookup).await {
                Ok(rows) => found.push(rows),
                Err(err) => return Err(abort(tx, PersistError::at(index, err)).await),
            }
        } else {
            found.push(Vec::new());
        }
        let failure = match tx.execute(statement).await {
            Ok(0) if index == 0 && first_row_must_succeed => PersistError::FirstRowRejected,
            Ok(count) => {
                counts.push(count);
                continue;
            }
            Err(err) => PersistError::at(index, err),
        };
        return Err(abort(tx, failure).await);
    }

    tx.commit().await?;
    Ok((counts, found))
}

/// Rolls back and returns the error to surface.
///
/// A failed rollback takes precedence over the error that caused it.
async fn abort<T: Transaction>(tx: T, cause: PersistError) -> PersistError {
    warn!(error = %cause, "Rolling back transaction");
    match tx.rollback().await {
        Ok(()) => cause,
        Err(rollback) => PersistError::Rollback {
            rollback: Box::new(rollback),
            cause: Box::new(cause),
        },
    }
}
