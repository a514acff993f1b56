//! In-memory connection for tests that need a database to stall.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::schema::{CanonicalType, ColumnDefinition, TableSchema};
use crate::core::traits::{DatabaseConnection, Dialect, ReadOptions};
use crate::core::value::{Batch, SqlValue};
use crate::drivers::SqliteDialect;
use crate::error::{Result, SyncError};

/// `events(id BIGINT PRIMARY KEY)`.
pub(crate) fn events_table() -> TableSchema {
    let mut id = ColumnDefinition::new("id", CanonicalType::BigInt).not_null();
    id.is_primary_key = true;
    TableSchema::new("events", vec![id]).unwrap()
}

/// `count` single-row batches for [`events_table`], the last one final.
pub(crate) fn event_batches(count: i64) -> Vec<Batch> {
    (1..=count)
        .map(|i| {
            let batch = Batch::new(vec![vec![SqlValue::I64(i)]]);
            if i == count {
                batch.mark_final()
            } else {
                batch
            }
        })
        .collect()
}

/// Serves fixed tables and batches, and can be told to hang on reads,
/// writes or statements.
pub(crate) struct ScriptedConnection {
    dialect: SqliteDialect,
    tables: Vec<TableSchema>,
    batches: Mutex<Vec<Batch>>,
    hang_after_batches: bool,
    hang_after_writes: Option<usize>,
    hang_on_execute: bool,
    writes: AtomicUsize,
    rows_written: AtomicUsize,
}

impl ScriptedConnection {
    pub(crate) fn new(tables: Vec<TableSchema>) -> Self {
        Self {
            dialect: SqliteDialect::new(),
            tables,
            batches: Mutex::new(Vec::new()),
            hang_after_batches: false,
            hang_after_writes: None,
            hang_on_execute: false,
            writes: AtomicUsize::new(0),
            rows_written: AtomicUsize::new(0),
        }
    }

    /// Batches handed out by the next `read_table`.
    pub(crate) fn with_batches(self, batches: Vec<Batch>) -> Self {
        *self.batches.lock().unwrap() = batches;
        self
    }

    /// Keep the read channel open and silent once the batches are sent.
    pub(crate) fn hang_after_batches(mut self) -> Self {
        self.hang_after_batches = true;
        self
    }

    /// Let `writes` batch writes through, then never finish another.
    pub(crate) fn hang_after_writes(mut self, writes: usize) -> Self {
        self.hang_after_writes = Some(writes);
        self
    }

    pub(crate) fn hang_on_execute(mut self) -> Self {
        self.hang_on_execute = true;
        self
    }

    pub(crate) fn rows_written(&self) -> usize {
        self.rows_written.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatabaseConnection for ScriptedConnection {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn is_open(&self) -> bool {
        true
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.tables.iter().map(|t| t.name.clone()).collect())
    }

    async fn get_columns(&self, table: &str) -> Result<Vec<ColumnDefinition>> {
        self.tables
            .iter()
            .find(|t| t.name == table)
            .map(|t| t.columns.clone())
            .ok_or_else(|| SyncError::Introspection(format!("table '{}' not found", table)))
    }

    async fn execute(&self, _sql: &str) -> Result<u64> {
        if self.hang_on_execute {
            std::future::pending::<()>().await;
        }
        Ok(0)
    }

    fn read_table(&self, _opts: ReadOptions) -> mpsc::Receiver<Result<Batch>> {
        let (tx, rx) = mpsc::channel(4);
        let batches = std::mem::take(&mut *self.batches.lock().unwrap());
        let hang = self.hang_after_batches;
        tokio::spawn(async move {
            for batch in batches {
                if tx.send(Ok(batch)).await.is_err() {
                    return;
                }
            }
            if hang {
                std::future::pending::<()>().await;
            }
            drop(tx);
        });
        rx
    }

    async fn write_batch(
        &self,
        _table: &str,
        _columns: &[ColumnDefinition],
        batch: Batch,
    ) -> Result<u64> {
        let done = self.writes.fetch_add(1, Ordering::SeqCst);
        if self.hang_after_writes.is_some_and(|limit| done >= limit) {
            std::future::pending::<()>().await;
        }
        self.rows_written.fetch_add(batch.len(), Ordering::SeqCst);
        Ok(batch.len() as u64)
    }

    async fn row_count(&self, _table: &str) -> Result<i64> {
        Ok(self.rows_written() as i64)
    }

    async fn close(&self) {}
}
