//! PostgreSQL database driver.
//!
//! - [`PostgresDialect`]: SQL syntax strategy
//! - [`PostgresConnection`]: deadpool-postgres pool implementing `DatabaseConnection`
//!
//! Tables are read from and created in the connection's `current_schema()`.

mod connection;
mod dialect;

pub use connection::PostgresConnection;
pub use dialect::PostgresDialect;
