//! Schema planning.
//!
//! Compares source tables against the target's table list and decides, per
//! table, whether the target needs a CREATE TABLE. Existing target tables are
//! never altered.

use std::collections::HashSet;

use serde::Serialize;

use crate::core::schema::TableSchema;
use crate::core::traits::Dialect;
use crate::error::Result;

/// What the schema phase does for one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    /// The table is missing on the target and will be created.
    Create,
    /// The table already exists on the target and is left alone.
    Skip,
}

/// Planned schema action for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncPlanEntry {
    pub table: String,
    pub action: PlanAction,
    /// Present exactly when `action` is [`PlanAction::Create`].
    pub ddl_statement: Option<String>,
}

/// Plan one table.
///
/// Table names are matched exactly. Fails with `UnsupportedType` when a
/// column has no mapping on the target dialect; a table that is skipped never
/// fails because its types are not looked at.
pub fn plan_table(
    table: &TableSchema,
    target_tables: &HashSet<String>,
    dialect: &dyn Dialect,
) -> Result<SyncPlanEntry> {
    if target_tables.contains(&table.name) {
        return Ok(SyncPlanEntry {
            table: table.name.clone(),
            action: PlanAction::Skip,
            ddl_statement: None,
        });
    }

    let ddl = dialect.generate_create_table(table)?;
    Ok(SyncPlanEntry {
        table: table.name.clone(),
        action: PlanAction::Create,
        ddl_statement: Some(ddl),
    })
}

/// Plan every table, one result per input table in input order.
///
/// A failure for one table does not stop the others from being planned.
pub fn plan(
    tables: &[TableSchema],
    target_tables: &HashSet<String>,
    dialect: &dyn Dialect,
) -> Vec<Result<SyncPlanEntry>> {
    tables
        .iter()
        .map(|t| plan_table(t, target_tables, dialect))
        .collect()
}
