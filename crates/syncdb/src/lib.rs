//! # syncdb
//!
//! Schema and data synchronization between SQLite, MySQL and PostgreSQL.
//!
//! The engine introspects the source database, creates the tables the target
//! is missing, and copies rows across in bounded batches:
//!
//! - **Cross-dialect type mapping** through a canonical column type
//! - **Streaming copy** with per-batch timeouts and value coercion
//! - **Best-effort runs**: one table's failure never stops the others
//! - **Bounded worker pool** for copying independent tables concurrently
//!
//! SQLite columns become booleans on the target only when declared
//! `BOOLEAN` or constrained with `CHECK (col IN (0, 1))`; a plain `INTEGER`
//! flag column is copied as a 64-bit integer. See [`drivers::sqlite`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use syncdb::{Config, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> syncdb::Result<()> {
//!     let config = Config::load("syncdb.yaml")?;
//!     let orchestrator = Orchestrator::new(config).await?;
//!     let report = orchestrator.run(CancellationToken::new()).await?;
//!     println!("Copied {} rows", report.rows_copied);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod orchestrator;
pub mod schema;
pub mod transfer;
pub mod typemap;

#[cfg(test)]
mod test_support;

// Re-exports for convenient access
pub use config::{Config, ConnectionDescriptor, DialectKind, LoggingConfig, SyncOptions};
pub use error::{Result, SyncError};
pub use orchestrator::{
    health_check, sync_all, HealthCheckResult, Orchestrator, SchemaAction, SyncReport,
    TableStatus, TableSyncResult, ValidationReport,
};
pub use schema::{PlanAction, SyncPlanEntry};
pub use transfer::{copy, CopyError, CopyOptions};
