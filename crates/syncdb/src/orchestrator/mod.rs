//! Sync orchestrator - main workflow coordinator.
//!
//! A run lists the source tables, applies the table filter, then makes two
//! full passes over the selection:
//!
//! 1. Schema phase: introspect each source table and create it on the target
//!    when it is missing. Runs one table at a time.
//! 2. Data phase: copy rows, up to `workers` tables at once.
//!
//! Every DDL statement has completed before the first row is copied. A table
//! that fails in one phase is recorded and the run moves on to the next.

mod report;

pub use report::{
    HealthCheckResult, RowCountCheck, SchemaAction, SyncReport, TableStatus, TableSyncResult,
    ValidationReport, CANCELLED,
};

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{validate_sync_options, Config, ConnectionDescriptor, SyncOptions};
use crate::core::schema::TableSchema;
use crate::core::traits::DatabaseConnection;
use crate::drivers;
use crate::error::{Result, SyncError};
use crate::schema::{introspect_table, list_tables, plan_table, PlanAction};
use crate::transfer::{copy, CopyOptions};

/// Sync orchestrator holding one open connection pool per side.
pub struct Orchestrator {
    config: Config,
    source: Arc<dyn DatabaseConnection>,
    target: Arc<dyn DatabaseConnection>,
}

impl Orchestrator {
    /// Open both databases.
    ///
    /// Pools are sized `workers + 1` so every data-phase worker holds its own
    /// connection. If the target cannot be opened the source is closed again.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let (pool_size, wait) = pool_settings(&config.sync_options);

        let source = drivers::connect("source", &config.source_db, pool_size, wait).await?;
        let target = match drivers::connect("target", &config.target_db, pool_size, wait).await {
            Ok(target) => target,
            Err(e) => {
                source.close().await;
                return Err(e);
            }
        };

        info!(
            "Connected: {} -> {}",
            config.source_db.redacted(),
            config.target_db.redacted()
        );

        Ok(Self {
            config,
            source,
            target,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn source(&self) -> &Arc<dyn DatabaseConnection> {
        &self.source
    }

    pub fn target(&self) -> &Arc<dyn DatabaseConnection> {
        &self.target
    }

    /// Run the sync and close both connections, whatever the outcome.
    pub async fn run(self, cancel: CancellationToken) -> Result<SyncReport> {
        let result = sync_all(
            self.source.clone(),
            self.target.clone(),
            &self.config.sync_options,
            &cancel,
        )
        .await;
        self.close().await;
        result
    }

    /// Compare row counts of the selected tables between source and target.
    pub async fn validate(&self) -> Result<ValidationReport> {
        let source_tables = list_tables(self.source.as_ref()).await?;
        let requested = &self.config.sync_options.tables;
        let tables: Vec<String> = if requested.is_empty() {
            source_tables
        } else {
            requested.clone()
        };

        let mut checks = Vec::with_capacity(tables.len());
        for table in tables {
            let source_rows = self.source.row_count(&table).await;
            let target_rows = self.target.row_count(&table).await;

            let error = match (&source_rows, &target_rows) {
                (Err(e), _) => Some(format!("source: {}", e)),
                (_, Err(e)) => Some(format!("target: {}", e)),
                _ => None,
            };
            let check = RowCountCheck {
                table,
                source_rows: source_rows.ok(),
                target_rows: target_rows.ok(),
                error,
            };

            if check.matches() {
                info!("{}: {:?} rows (match)", check.table, check.source_rows);
            } else {
                warn!(
                    "{}: source={:?} target={:?} (MISMATCH)",
                    check.table, check.source_rows, check.target_rows
                );
            }
            checks.push(check);
        }

        Ok(ValidationReport { tables: checks })
    }

    /// Close both connection pools.
    pub async fn close(&self) {
        self.source.close().await;
        self.target.close().await;
        debug!("Connections closed");
    }
}

fn pool_settings(opts: &SyncOptions) -> (u32, Duration) {
    let pool_size = u32::try_from(opts.workers.max(1))
        .unwrap_or(u32::MAX - 1)
        .saturating_add(1);
    (pool_size, Duration::from_secs(opts.timeout_secs.max(1)))
}

/// Open each side on its own, ping it and count its tables.
///
/// Never fails: unreachable databases are reported in the result. No schema
/// or data is touched.
pub async fn health_check(config: &Config) -> HealthCheckResult {
    let (_, wait) = pool_settings(&config.sync_options);
    let source = probe("source", &config.source_db, wait).await;
    let target = probe("target", &config.target_db, wait).await;

    HealthCheckResult {
        healthy: source.error.is_none() && target.error.is_none(),
        source_connected: source.connected,
        source_latency_ms: source.latency_ms,
        source_tables: source.tables,
        source_error: source.error,
        target_connected: target.connected,
        target_latency_ms: target.latency_ms,
        target_tables: target.tables,
        target_error: target.error,
    }
}

struct Probe {
    connected: bool,
    latency_ms: u64,
    tables: Option<usize>,
    error: Option<String>,
}

async fn probe(side: &str, desc: &ConnectionDescriptor, wait: Duration) -> Probe {
    let start = Instant::now();
    let conn = match drivers::connect(side, desc, 1, wait).await {
        Ok(conn) => conn,
        Err(e) => {
            return Probe {
                connected: false,
                latency_ms: start.elapsed().as_millis() as u64,
                tables: None,
                error: Some(e.to_string()),
            }
        }
    };

    let ping = conn.ping().await;
    let latency_ms = start.elapsed().as_millis() as u64;
    let probe = match ping {
        Ok(()) => match list_tables(conn.as_ref()).await {
            Ok(tables) => Probe {
                connected: true,
                latency_ms,
                tables: Some(tables.len()),
                error: None,
            },
            Err(e) => Probe {
                connected: true,
                latency_ms,
                tables: None,
                error: Some(e.to_string()),
            },
        },
        Err(e) => Probe {
            connected: false,
            latency_ms,
            tables: None,
            error: Some(e.to_string()),
        },
    };
    conn.close().await;
    probe
}

/// Synchronize the selected tables from `source` into `target`.
///
/// Per-table failures land in the report. Invalid options and failing to list
/// the tables of either side are errors. Tables not finished when `cancel` fires are
/// reported failed with detail [`CANCELLED`]. Connections are left open.
pub async fn sync_all(
    source: Arc<dyn DatabaseConnection>,
    target: Arc<dyn DatabaseConnection>,
    options: &SyncOptions,
    cancel: &CancellationToken,
) -> Result<SyncReport> {
    validate_sync_options(options)?;

    let started_at = Utc::now();
    let run_id = uuid::Uuid::new_v4().to_string();
    info!("Starting sync run: {}", run_id);

    let source_tables = list_tables(source.as_ref()).await?;
    let mut target_tables: HashSet<String> =
        list_tables(target.as_ref()).await?.into_iter().collect();

    let selection = select_tables(&source_tables, &options.tables);
    info!(
        "{} tables selected ({} in source)",
        selection.len(),
        source_tables.len()
    );

    let mut results: Vec<TableSyncResult> = selection
        .iter()
        .map(|(name, _)| TableSyncResult::pending(name.as_str()))
        .collect();
    let mut schemas: Vec<Option<TableSchema>> = vec![None; selection.len()];

    // Phase 1: schema
    if options.runs_schema_phase() {
        info!("Phase 1: creating missing tables");
    } else {
        info!("Phase 1: skipped (data only)");
    }
    for (idx, (name, in_source)) in selection.iter().enumerate() {
        if cancel.is_cancelled() {
            break;
        }

        let result = &mut results[idx];
        if !in_source {
            warn!("{}: not found in source", name);
            result.fail("table does not exist in source");
            continue;
        }

        let table = match introspect_table(source.as_ref(), name).await {
            Ok(table) => table,
            Err(e) => {
                warn!("{}: {}", name, e);
                result.fail(e.to_string());
                continue;
            }
        };

        if options.runs_schema_phase() {
            if let Err(e) = schema_phase(target.as_ref(), &table, &mut target_tables, options, result)
                .await
            {
                warn!("{}: {}", name, e);
                result.fail(e.to_string());
                continue;
            }
        } else if !target_tables.contains(name.as_str()) {
            warn!("{}: not found in target", name);
            result.fail("table does not exist in target");
            continue;
        }

        if options.runs_data_phase() {
            schemas[idx] = Some(table);
        } else {
            result.succeed();
        }
    }

    // Phase 2: data
    if options.runs_data_phase() {
        data_phase(source, target, options, cancel, schemas, &mut results).await;
    }

    if cancel.is_cancelled() {
        warn!("Sync cancelled");
    }

    let report = SyncReport::new(run_id, started_at, results);
    info!(
        "Sync {}: {} tables ({} failed), {} rows in {:.1}s",
        if report.success { "completed" } else { "failed" },
        report.results.len(),
        report.tables_failed(),
        report.rows_copied,
        report.duration_seconds
    );
    Ok(report)
}

/// Selected table names in order, each flagged with whether the source has it.
/// A name requested twice is selected once, at its first position.
fn select_tables(source_tables: &[String], requested: &[String]) -> Vec<(String, bool)> {
    if requested.is_empty() {
        return source_tables.iter().map(|t| (t.clone(), true)).collect();
    }
    let mut seen = HashSet::new();
    requested
        .iter()
        .filter(|t| seen.insert(t.as_str()))
        .map(|t| (t.clone(), source_tables.contains(t)))
        .collect()
}

async fn schema_phase(
    target: &dyn DatabaseConnection,
    table: &TableSchema,
    target_tables: &mut HashSet<String>,
    options: &SyncOptions,
    result: &mut TableSyncResult,
) -> Result<()> {
    let entry = plan_table(table, target_tables, target.dialect())?;
    match (entry.action, entry.ddl_statement) {
        (PlanAction::Create, Some(ddl)) => {
            debug!("{}", ddl);
            let secs = options.timeout_secs.max(1);
            match timeout(Duration::from_secs(secs), target.execute(&ddl)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(SyncError::schema(&table.name, e)),
                Err(_) => {
                    return Err(SyncError::timeout(
                        format!("creating {}", table.name),
                        secs,
                    ))
                }
            }
            info!("{}: created", table.name);
            target_tables.insert(table.name.clone());
            result.schema_action = SchemaAction::Created;
            result.ddl_statement = Some(ddl);
        }
        _ => {
            debug!("{}: already present in target", table.name);
            result.schema_action = SchemaAction::AlreadyPresent;
        }
    }
    Ok(())
}

async fn data_phase(
    source: Arc<dyn DatabaseConnection>,
    target: Arc<dyn DatabaseConnection>,
    options: &SyncOptions,
    cancel: &CancellationToken,
    schemas: Vec<Option<TableSchema>>,
    results: &mut [TableSyncResult],
) {
    let workers = options.workers.max(1);
    info!("Phase 2: copying data with {} workers", workers);

    let semaphore = Arc::new(Semaphore::new(workers));
    let copy_opts = CopyOptions::from_sync_options(options);
    let mut handles = Vec::new();

    for (idx, schema) in schemas.into_iter().enumerate() {
        let Some(table) = schema else { continue };

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(e) => {
                    results[idx].fail(format!("worker pool closed: {}", e));
                    continue;
                }
            },
        };

        let source = source.clone();
        let target = target.clone();
        let copy_opts = copy_opts.clone();
        let cancel = cancel.clone();
        let truncate = options.truncate_target;

        let handle = tokio::spawn(async move {
            let _permit = permit;
            copy(
                source.as_ref(),
                target.as_ref(),
                &table,
                truncate,
                &copy_opts,
                &cancel,
            )
            .await
        });
        handles.push((idx, handle));
    }

    for (idx, handle) in handles {
        let result = &mut results[idx];
        match handle.await {
            Ok(Ok(rows)) => {
                result.rows_copied = rows;
                result.succeed();
            }
            Ok(Err(e)) => {
                result.rows_copied = e.rows_copied;
                match e.source {
                    SyncError::Cancelled => result.fail(CANCELLED),
                    source => {
                        warn!("{}: {} ({} rows copied)", result.table, source, e.rows_copied);
                        result.fail(source.to_string());
                    }
                }
            }
            Err(e) => {
                error!("{}: copy task failed - {}", result.table, e);
                result.fail(format!("copy task failed: {}", e));
            }
        }
    }
}
