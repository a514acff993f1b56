//! Database driver implementations.
//!
//! Each driver module implements the core traits for one engine:
//!
//! - [`sqlite`]: SQLite through SQLx
//! - [`mysql`]: MySQL/MariaDB through SQLx
//! - [`postgres`]: PostgreSQL through tokio-postgres and deadpool-postgres
//! - [`common`]: TLS settings shared by the network drivers
//!
//! The variant is chosen by the descriptor's dialect tag in [`connect`]; the
//! engine only ever holds `Arc<dyn DatabaseConnection>`.

pub mod common;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

use std::sync::Arc;
use std::time::Duration;

pub use common::SslMode;
pub use mysql::{MysqlConnection, MysqlDialect};
pub use postgres::{PostgresConnection, PostgresDialect};
pub use sqlite::{SqliteConnection, SqliteDialect};

use crate::config::{ConnectionDescriptor, DialectKind};
use crate::core::traits::{DatabaseConnection, Dialect};
use crate::error::{Result, SyncError};

/// Open a pooled connection for a descriptor.
///
/// `side` names the connection in errors ("source" or "target"). Any failure
/// to reach the database is reported as a connection error.
pub async fn connect(
    side: &str,
    desc: &ConnectionDescriptor,
    max_conns: u32,
    timeout: Duration,
) -> Result<Arc<dyn DatabaseConnection>> {
    let result: Result<Arc<dyn DatabaseConnection>> = match desc.dialect {
        DialectKind::Sqlite => SqliteConnection::connect(desc, max_conns, timeout)
            .await
            .map(|c| Arc::new(c) as Arc<dyn DatabaseConnection>),
        DialectKind::Mysql => MysqlConnection::connect(desc, max_conns, timeout)
            .await
            .map(|c| Arc::new(c) as Arc<dyn DatabaseConnection>),
        DialectKind::Postgresql => PostgresConnection::connect(desc, max_conns, timeout)
            .await
            .map(|c| Arc::new(c) as Arc<dyn DatabaseConnection>),
    };

    result.map_err(|e| match e {
        SyncError::Config(_) | SyncError::Connection { .. } => e,
        other => SyncError::connection(
            side,
            format!("{} ({})", other, desc.redacted()),
        ),
    })
}

/// The dialect for a dialect tag, without opening a connection.
pub fn dialect_for(kind: DialectKind) -> Box<dyn Dialect> {
    match kind {
        DialectKind::Sqlite => Box::new(SqliteDialect::new()),
        DialectKind::Mysql => Box::new(MysqlDialect::new()),
        DialectKind::Postgresql => Box::new(PostgresDialect::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_for() {
        assert_eq!(dialect_for(DialectKind::Sqlite).name(), "sqlite");
        assert_eq!(dialect_for(DialectKind::Mysql).quote_ident("t"), "`t`");
        assert_eq!(dialect_for(DialectKind::Postgresql).param_placeholder(2), "$2");
    }

    #[tokio::test]
    async fn test_connect_sqlite_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.db");
        let desc = ConnectionDescriptor::sqlite(path.to_string_lossy());
        let conn = connect("source", &desc, 2, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(conn.dialect().kind(), DialectKind::Sqlite);
        assert!(conn.list_tables().await.unwrap().is_empty());
        conn.close().await;
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_connect_failure_names_side_and_hides_password() {
        let desc = ConnectionDescriptor::network(DialectKind::Postgresql, "127.0.0.1", "app")
            .with_port(1)
            .with_credentials("app", "hunter2");
        let err = match connect("target", &desc, 1, Duration::from_secs(1)).await {
            Ok(_) => panic!("connection to a closed port succeeded"),
            Err(e) => e,
        };
        let msg = err.to_string();
        assert!(msg.contains("target"));
        assert!(!msg.contains("hunter2"));
    }
}
