//! Core abstractions for database-agnostic synchronization.
//!
//! - [`schema`]: canonical types, column and table metadata
//! - [`value`]: SQL values, coercion and row batches
//! - [`traits`]: the [`Dialect`] and [`DatabaseConnection`] seams
//! - [`identifier`]: identifier validation and quoting
//!
//! Drivers under `drivers/` implement the traits; the introspector, planner,
//! copier and orchestrator only ever talk to the traits.

pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

pub use schema::{split_native_type, CanonicalType, ColumnDefinition, TableSchema, TypeHints};
pub use traits::{DatabaseConnection, Dialect, ReadOptions, TypeMapping};
pub use value::{Batch, SqlNullType, SqlValue};
