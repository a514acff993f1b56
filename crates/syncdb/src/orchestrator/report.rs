//! Run reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Detail recorded for tables a cancelled run never finished.
pub const CANCELLED: &str = "cancelled";

/// What the schema phase did for a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaAction {
    /// The table was created on the target.
    Created,
    /// The table already existed on the target.
    AlreadyPresent,
    /// The schema phase did not run for this table.
    Skipped,
}

/// Outcome of one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Success,
    Failed,
}

/// Result for one table of a sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSyncResult {
    pub table: String,
    pub schema_action: SchemaAction,
    pub rows_copied: u64,
    pub status: TableStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    /// CREATE TABLE executed for this table, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ddl_statement: Option<String>,
}

impl TableSyncResult {
    /// A table that has not been processed yet. Until a phase records
    /// otherwise it reads as failed with [`CANCELLED`].
    pub fn pending(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            schema_action: SchemaAction::Skipped,
            rows_copied: 0,
            status: TableStatus::Failed,
            error_detail: Some(CANCELLED.to_string()),
            ddl_statement: None,
        }
    }

    /// Mark the table finished successfully.
    pub fn succeed(&mut self) {
        self.status = TableStatus::Success;
        self.error_detail = None;
    }

    /// Mark the table failed.
    pub fn fail(&mut self, detail: impl Into<String>) {
        self.status = TableStatus::Failed;
        self.error_detail = Some(detail.into());
    }

    pub fn is_success(&self) -> bool {
        self.status == TableStatus::Success
    }
}

/// Aggregate result of a sync run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    /// Unique run identifier.
    pub run_id: String,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Total rows copied across all tables.
    pub rows_copied: u64,

    /// True when every table succeeded.
    pub success: bool,

    /// One result per attempted table, in selection order.
    pub results: Vec<TableSyncResult>,
}

impl SyncReport {
    /// Build the report for a finished run.
    pub fn new(run_id: String, started_at: DateTime<Utc>, results: Vec<TableSyncResult>) -> Self {
        let completed_at = Utc::now();
        let duration_seconds = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;
        Self {
            run_id,
            started_at,
            completed_at,
            duration_seconds,
            rows_copied: results.iter().map(|r| r.rows_copied).sum(),
            success: results.iter().all(TableSyncResult::is_success),
            results,
        }
    }

    pub fn tables_success(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn tables_failed(&self) -> usize {
        self.results.len() - self.tables_success()
    }

    /// Results of failed tables.
    pub fn failures(&self) -> impl Iterator<Item = &TableSyncResult> {
        self.results.iter().filter(|r| !r.is_success())
    }

    /// Find the result for a table.
    pub fn result(&self, table: &str) -> Option<&TableSyncResult> {
        self.results.iter().find(|r| r.table == table)
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Reachability of both databases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub healthy: bool,
    pub source_connected: bool,
    pub source_latency_ms: u64,
    pub source_tables: Option<usize>,
    pub source_error: Option<String>,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    pub target_tables: Option<usize>,
    pub target_error: Option<String>,
}

/// Row counts of one table on both sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowCountCheck {
    pub table: String,
    pub source_rows: Option<i64>,
    pub target_rows: Option<i64>,
    pub error: Option<String>,
}

impl RowCountCheck {
    /// Both counts were read and are equal.
    pub fn matches(&self) -> bool {
        self.error.is_none() && self.source_rows.is_some() && self.source_rows == self.target_rows
    }
}

/// Row count comparison across tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub tables: Vec<RowCountCheck>,
}

impl ValidationReport {
    pub fn success(&self) -> bool {
        self.tables.iter().all(RowCountCheck::matches)
    }

    pub fn mismatches(&self) -> impl Iterator<Item = &RowCountCheck> {
        self.tables.iter().filter(|t| !t.matches())
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
