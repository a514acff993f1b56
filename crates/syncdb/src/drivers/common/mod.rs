//! Utilities shared across database drivers.

pub mod tls;

pub use tls::{postgres_connector, SslMode};
