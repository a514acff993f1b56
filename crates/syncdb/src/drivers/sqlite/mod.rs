//! SQLite database driver.
//!
//! - [`SqliteDialect`]: SQL syntax strategy
//! - [`SqliteConnection`]: SQLx pool implementing `DatabaseConnection`
//!
//! # Connection String
//!
//! ```text
//! sqlite:///absolute/path/to/file.db
//! sqlite://relative/path.db
//! sqlite://:memory:
//! ```
//!
//! # Booleans
//!
//! SQLite has no boolean storage class. A column reads as canonical `boolean`
//! only when it is declared `BOOLEAN`/`BOOL` or carries a
//! `CHECK (col IN (0, 1))` constraint. A plain `INTEGER` column holding 0 and
//! 1 stays `bigint`, and the target gets a 64-bit integer column for it.

mod connection;
mod dialect;

pub use connection::SqliteConnection;
pub use dialect::{has_boolean_check, SqliteDialect};
