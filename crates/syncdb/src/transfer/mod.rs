//! Data copier.
//!
//! Streams one table from the source into the target in bounded batches:
//!
//! ```text
//! source.read_table ──mpsc──> coerce to target column types ──> target.write_batch
//! ```
//!
//! At most a few batches are in memory at once. Every batch is committed on
//! its own, so a failure part way through leaves the earlier batches in the
//! target and reports how many rows made it.

use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::SyncOptions;
use crate::core::schema::{ColumnDefinition, TableSchema};
use crate::core::traits::{DatabaseConnection, ReadOptions};
use crate::core::value::{Batch, SqlValue};
use crate::error::SyncError;

/// Copier settings.
#[derive(Debug, Clone)]
pub struct CopyOptions {
    /// Rows per batch.
    pub batch_size: usize,
    /// Upper bound for one batch read or one batch write.
    pub timeout: Duration,
}

impl CopyOptions {
    /// Copier settings from the sync options.
    pub fn from_sync_options(opts: &SyncOptions) -> Self {
        Self {
            batch_size: opts.batch_size.max(1),
            timeout: Duration::from_secs(opts.timeout_secs.max(1)),
        }
    }
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            batch_size: 1_000,
            timeout: Duration::from_secs(30),
        }
    }
}

/// A failed copy, with the rows committed before the failure.
#[derive(Debug, Error)]
#[error("{source} ({rows_copied} rows copied)")]
pub struct CopyError {
    pub rows_copied: u64,
    pub source: SyncError,
}

impl CopyError {
    fn new(rows_copied: u64, source: SyncError) -> Self {
        Self {
            rows_copied,
            source,
        }
    }
}

/// Copy every row of `table` from `source` into the existing table of the
/// same name on `target`.
///
/// Source columns are matched to target columns by name (exact first, then
/// ignoring case) and each value is coerced to the target column's canonical
/// type. With `truncate_first` the target table is emptied before the first
/// batch. Rows are read in primary key order when the table has a single
/// column key.
///
/// Returns the number of rows written.
pub async fn copy(
    source: &dyn DatabaseConnection,
    target: &dyn DatabaseConnection,
    table: &TableSchema,
    truncate_first: bool,
    opts: &CopyOptions,
    cancel: &CancellationToken,
) -> std::result::Result<u64, CopyError> {
    let name = table.name.as_str();
    let secs = opts.timeout.as_secs();
    let start = Instant::now();

    if cancel.is_cancelled() {
        return Err(CopyError::new(0, SyncError::Cancelled));
    }

    let target_columns = target
        .get_columns(name)
        .await
        .map_err(|e| CopyError::new(0, e))?;
    let columns = align_columns(table, &target_columns).map_err(|e| CopyError::new(0, e))?;

    if truncate_first {
        let sql = target.dialect().truncate_statement(name);
        debug!("{}", sql);
        match timeout(opts.timeout, target.execute(&sql)).await {
            Ok(Ok(_)) => info!("{}: target truncated", name),
            Ok(Err(e)) => return Err(CopyError::new(0, SyncError::truncate(name, e))),
            Err(_) => {
                return Err(CopyError::new(
                    0,
                    SyncError::timeout(format!("truncating {}", name), secs),
                ))
            }
        }
    }

    let mut rx = source.read_table(ReadOptions::new(table, opts.batch_size));
    let mut rows_copied = 0u64;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(CopyError::new(rows_copied, SyncError::Cancelled));
            }
            next = timeout(opts.timeout, rx.recv()) => next,
        };

        let batch = match next {
            Ok(Some(Ok(batch))) => batch,
            Ok(Some(Err(e))) => return Err(CopyError::new(rows_copied, e)),
            Ok(None) => {
                return Err(CopyError::new(
                    rows_copied,
                    SyncError::insert(name, "source stream ended unexpectedly"),
                ))
            }
            Err(_) => {
                return Err(CopyError::new(
                    rows_copied,
                    SyncError::timeout(format!("reading {}", name), secs),
                ))
            }
        };

        let is_last = batch.is_last;
        if !batch.is_empty() {
            let coerced = coerce_batch(name, batch, &columns)
                .map_err(|e| CopyError::new(rows_copied, e))?;
            let count = coerced.len() as u64;

            match timeout(opts.timeout, target.write_batch(name, &columns, coerced)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e @ SyncError::Insert { .. })) => {
                    return Err(CopyError::new(rows_copied, e))
                }
                Ok(Err(e)) => return Err(CopyError::new(rows_copied, SyncError::insert(name, e))),
                Err(_) => {
                    return Err(CopyError::new(
                        rows_copied,
                        SyncError::timeout(format!("writing {}", name), secs),
                    ))
                }
            }

            rows_copied += count;
            debug!("{}: wrote {} rows (total {})", name, count, rows_copied);
        }

        if is_last {
            break;
        }
    }

    info!(
        "{}: copied {} rows in {:.2?}",
        name,
        rows_copied,
        start.elapsed()
    );
    Ok(rows_copied)
}

/// Target column for every source column, in source order.
fn align_columns(
    table: &TableSchema,
    target_columns: &[ColumnDefinition],
) -> crate::error::Result<Vec<ColumnDefinition>> {
    table
        .columns
        .iter()
        .map(|src| {
            target_columns
                .iter()
                .find(|t| t.name == src.name)
                .or_else(|| {
                    target_columns
                        .iter()
                        .find(|t| t.name.eq_ignore_ascii_case(&src.name))
                })
                .cloned()
                .ok_or_else(|| {
                    SyncError::insert(
                        &table.name,
                        format!("column {} does not exist in target", src.name),
                    )
                })
        })
        .collect()
}

fn coerce_batch(table: &str, batch: Batch, columns: &[ColumnDefinition]) -> crate::error::Result<Batch> {
    let mut rows = Vec::with_capacity(batch.rows.len());
    for row in batch.rows {
        if row.len() != columns.len() {
            return Err(SyncError::insert(
                table,
                format!("row has {} values, expected {}", row.len(), columns.len()),
            ));
        }
        let coerced = row
            .into_iter()
            .zip(columns)
            .map(|(value, col)| {
                value
                    .coerce(&col.canonical_type)
                    .map_err(|e| SyncError::insert(table, format!("column {}: {}", col.name, e)))
            })
            .collect::<crate::error::Result<Vec<SqlValue<'static>>>>()?;
        rows.push(coerced);
    }
    Ok(Batch::new(rows))
}
