//! Error types for the synchronization library.

use thiserror::Error;

/// Exit code for configuration problems.
pub const EXIT_CONFIG: u8 = 1;
/// Exit code when a database could not be reached.
pub const EXIT_CONNECTION: u8 = 2;
/// Exit code when the sync finished but at least one table failed.
pub const EXIT_SYNC_FAILED: u8 = 3;
/// Exit code when a row count validation found mismatches.
pub const EXIT_VALIDATION: u8 = 4;
/// Exit code for a user interrupt.
pub const EXIT_CANCELLED: u8 = 5;
/// Exit code for file system errors.
pub const EXIT_IO: u8 = 7;
/// Exit code for anything else.
pub const EXIT_OTHER: u8 = 10;

/// Main error type for sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Configuration error (invalid YAML, bad connection string, conflicting flags)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A database could not be opened or reached
    #[error("Connection error ({side}): {message}")]
    Connection { side: String, message: String },

    /// Metadata query failed
    #[error("Introspection failed: {0}")]
    Introspection(String),

    /// No mapping exists for a canonical type on the target dialect
    #[error("Unsupported type '{type_name}' for {dialect}")]
    UnsupportedType { type_name: String, dialect: String },

    /// DDL execution failed for a table
    #[error("Schema error for table {table}: {message}")]
    Schema { table: String, message: String },

    /// Truncating a target table failed
    #[error("Truncate failed for table {table}: {message}")]
    Truncate { table: String, message: String },

    /// Writing a batch into a target table failed
    #[error("Insert failed for table {table}: {message}")]
    Insert { table: String, message: String },

    /// A read or write did not complete within the configured timeout
    #[error("Timed out after {seconds}s while {operation}")]
    Timeout { operation: String, seconds: u64 },

    /// A value could not be converted to the target column type
    #[error("Cannot coerce value: {0}")]
    Coercion(String),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Row count validation found differences
    #[error("Validation failed: {0}")]
    Validation(String),

    /// SQLite or MySQL driver error
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// PostgreSQL driver error
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Sync was cancelled (SIGINT, etc.)
    #[error("Sync cancelled")]
    Cancelled,
}

impl SyncError {
    /// Create a Connection error for one side of the sync.
    pub fn connection(side: impl Into<String>, message: impl ToString) -> Self {
        SyncError::Connection {
            side: side.into(),
            message: message.to_string(),
        }
    }

    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        SyncError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Schema error
    pub fn schema(table: impl Into<String>, message: impl ToString) -> Self {
        SyncError::Schema {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create a Truncate error
    pub fn truncate(table: impl Into<String>, message: impl ToString) -> Self {
        SyncError::Truncate {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create an Insert error
    pub fn insert(table: impl Into<String>, message: impl ToString) -> Self {
        SyncError::Insert {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create a Timeout error
    pub fn timeout(operation: impl Into<String>, seconds: u64) -> Self {
        SyncError::Timeout {
            operation: operation.into(),
            seconds,
        }
    }

    /// Whether this error means a database could not be reached at all.
    pub fn is_connection(&self) -> bool {
        matches!(self, SyncError::Connection { .. } | SyncError::Pool { .. })
    }

    /// Map the error to a process exit code.
    pub fn exit_code(&self) -> u8 {
        match self {
            SyncError::Config(_) | SyncError::Yaml(_) => EXIT_CONFIG,
            SyncError::Connection { .. } | SyncError::Pool { .. } => EXIT_CONNECTION,
            SyncError::Validation(_) => EXIT_VALIDATION,
            SyncError::Cancelled => EXIT_CANCELLED,
            SyncError::Io(_) => EXIT_IO,
            _ => EXIT_OTHER,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(SyncError::Config("bad".into()).exit_code(), EXIT_CONFIG);
        assert_eq!(
            SyncError::connection("source", "refused").exit_code(),
            EXIT_CONNECTION
        );
        assert_eq!(SyncError::Cancelled.exit_code(), EXIT_CANCELLED);
        assert_eq!(SyncError::insert("users", "boom").exit_code(), EXIT_OTHER);
    }

    #[test]
    fn test_unsupported_type_message_names_type_and_dialect() {
        let err = SyncError::UnsupportedType {
            type_name: "geometry".into(),
            dialect: "mysql".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("geometry"));
        assert!(msg.contains("mysql"));
    }

    #[test]
    fn test_format_detailed_includes_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.yaml");
        let err = SyncError::from(io);
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: IO error"));
    }

    #[test]
    fn test_is_connection() {
        assert!(SyncError::connection("target", "down").is_connection());
        assert!(SyncError::pool("timeout", "acquire").is_connection());
        assert!(!SyncError::truncate("t", "fk").is_connection());
    }
}
