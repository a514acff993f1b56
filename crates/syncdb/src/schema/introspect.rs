//! Schema introspection.
//!
//! Reads table and column metadata through the connection's catalog queries.
//! Tables come back in the database's own listing order; callers that need a
//! stable order sort explicitly.

use tracing::debug;

use crate::core::identifier::validate_identifier;
use crate::core::schema::TableSchema;
use crate::core::traits::DatabaseConnection;
use crate::error::{Result, SyncError};

fn ensure_open(conn: &dyn DatabaseConnection) -> Result<()> {
    if conn.is_open() {
        Ok(())
    } else {
        Err(SyncError::connection(
            conn.dialect().name(),
            "connection is not open",
        ))
    }
}

fn introspection_error(context: &str, err: SyncError) -> SyncError {
    match err {
        SyncError::Introspection(_) => err,
        other => SyncError::Introspection(format!("{}: {}", context, other)),
    }
}

/// List user tables.
pub async fn list_tables(conn: &dyn DatabaseConnection) -> Result<Vec<String>> {
    ensure_open(conn)?;
    conn.list_tables()
        .await
        .map_err(|e| introspection_error("listing tables", e))
}

/// Read the definition of one table.
pub async fn introspect_table(conn: &dyn DatabaseConnection, table: &str) -> Result<TableSchema> {
    ensure_open(conn)?;
    validate_identifier(table)?;

    let columns = conn
        .get_columns(table)
        .await
        .map_err(|e| introspection_error(table, e))?;
    debug!("{}: {} columns", table, columns.len());
    TableSchema::new(table, columns)
}

/// Read every user table.
///
/// All-or-nothing: if any metadata query fails, the tables already read are
/// discarded and the error is returned.
pub async fn introspect(conn: &dyn DatabaseConnection) -> Result<Vec<TableSchema>> {
    let names = list_tables(conn).await?;
    let mut tables = Vec::with_capacity(names.len());
    for name in &names {
        tables.push(introspect_table(conn, name).await?);
    }
    Ok(tables)
}
