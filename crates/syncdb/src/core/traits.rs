//! Core traits for database-agnostic synchronization.
//!
//! - [`Dialect`]: SQL syntax and type vocabulary of one database engine
//! - [`DatabaseConnection`]: an open connection pool to one database
//!
//! # Design Patterns
//!
//! - **Strategy**: each dialect provides interchangeable quoting, DDL and type rules
//! - **Template Method**: default methods on [`Dialect`] build CREATE TABLE,
//!   SELECT and INSERT statements from the per-dialect primitives

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::DialectKind;
use crate::error::Result;

use super::schema::{CanonicalType, ColumnDefinition, TableSchema, TypeHints};
use super::value::Batch;

/// Options for reading rows from a table.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Table name.
    pub table: String,
    /// Columns to read, in the order values appear in each row.
    pub columns: Vec<ColumnDefinition>,
    /// Column to order by (the designated primary key, when there is one).
    pub order_by: Option<String>,
    /// Number of rows per batch.
    pub batch_size: usize,
}

impl ReadOptions {
    /// Read every column of a table in natural order.
    pub fn new(table: &TableSchema, batch_size: usize) -> Self {
        Self {
            table: table.name.clone(),
            columns: table.columns.clone(),
            order_by: table.primary_key().map(|c| c.name.clone()),
            batch_size,
        }
    }
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            table: String::new(),
            columns: Vec::new(),
            order_by: None,
            batch_size: 1_000,
        }
    }
}

/// SQL syntax strategy for one database engine.
///
/// Implementations are pure: nothing here touches a connection. The default
/// methods assemble statements out of [`Dialect::quote_ident`],
/// [`Dialect::param_placeholder`] and the type mapping.
pub trait Dialect: Send + Sync {
    /// Get the dialect identifier (e.g., "sqlite", "mysql", "postgresql").
    fn name(&self) -> &str;

    /// The dialect tag.
    fn kind(&self) -> DialectKind;

    /// Quote an identifier (table name, column name, etc.).
    ///
    /// - SQLite/PostgreSQL: `"identifier"`
    /// - MySQL: `` `identifier` ``
    fn quote_ident(&self, name: &str) -> String;

    /// Get a parameter placeholder for the given 1-based index.
    ///
    /// - SQLite/MySQL: `?`
    /// - PostgreSQL: `$1`, `$2`, etc.
    fn param_placeholder(&self, index: usize) -> String;

    /// Maximum number of bind parameters in one statement.
    fn max_params(&self) -> usize;

    /// Statement that removes all rows from a table without dropping it.
    fn truncate_statement(&self, table: &str) -> String {
        format!("TRUNCATE TABLE {}", self.quote_ident(table))
    }

    /// Translate a native column type into the canonical vocabulary.
    ///
    /// Types without a canonical equivalent become [`CanonicalType::Unknown`].
    fn native_type_to_canonical(&self, native: &str, hints: &TypeHints) -> CanonicalType;

    /// Translate a canonical type into this dialect's DDL vocabulary.
    ///
    /// Fails with `UnsupportedType` when no mapping exists.
    fn canonical_to_native_ddl(&self, canonical: &CanonicalType) -> Result<TypeMapping>;

    /// Text appended after the closing parenthesis of CREATE TABLE.
    fn create_table_suffix(&self) -> &str {
        ""
    }

    /// Build a CREATE TABLE statement for a table.
    ///
    /// Column order and nullability follow the schema. The designated primary
    /// key, if any, is declared inline.
    fn generate_create_table(&self, table: &TableSchema) -> Result<String> {
        let mut col_defs = Vec::with_capacity(table.columns.len());
        for col in &table.columns {
            let mapping = crate::typemap::map(&col.canonical_type, self)?;
            let constraint = if col.is_primary_key {
                " PRIMARY KEY"
            } else if !col.nullable {
                " NOT NULL"
            } else {
                ""
            };
            col_defs.push(format!(
                "{} {}{}",
                self.quote_ident(&col.name),
                mapping.target_type,
                constraint
            ));
        }

        Ok(format!(
            "CREATE TABLE {} (\n    {}\n){}",
            self.quote_ident(&table.name),
            col_defs.join(",\n    "),
            self.create_table_suffix()
        ))
    }

    /// Expression used to select a column when reading rows.
    fn select_expr(&self, col: &ColumnDefinition) -> String {
        self.quote_ident(&col.name)
    }

    /// Build the SELECT used to stream a table.
    fn build_select(&self, opts: &ReadOptions) -> String {
        let cols = opts
            .columns
            .iter()
            .map(|c| self.select_expr(c))
            .collect::<Vec<_>>()
            .join(", ");

        let mut sql = format!("SELECT {} FROM {}", cols, self.quote_ident(&opts.table));
        if let Some(ref pk) = opts.order_by {
            sql.push_str(&format!(" ORDER BY {}", self.quote_ident(pk)));
        }
        sql
    }

    /// Placeholder for one value headed to the given target column.
    fn insert_placeholder(&self, index: usize, _col: &ColumnDefinition) -> String {
        self.param_placeholder(index)
    }

    /// Build a multi-row parameterized INSERT for `row_count` rows.
    fn build_insert(&self, table: &str, columns: &[ColumnDefinition], row_count: usize) -> String {
        let col_list = columns
            .iter()
            .map(|c| self.quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ");

        let mut idx = 1;
        let mut rows = Vec::with_capacity(row_count);
        for _ in 0..row_count {
            let placeholders: Vec<String> = columns
                .iter()
                .map(|c| {
                    let p = self.insert_placeholder(idx, c);
                    idx += 1;
                    p
                })
                .collect();
            rows.push(format!("({})", placeholders.join(", ")));
        }

        format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.quote_ident(table),
            col_list,
            rows.join(", ")
        )
    }

    /// Largest number of rows one INSERT may carry for `num_cols` columns.
    fn max_rows_per_insert(&self, num_cols: usize) -> usize {
        if num_cols == 0 {
            return 0;
        }
        (self.max_params() / num_cols).max(1)
    }
}

/// An open connection pool to one database.
///
/// The engine holds one of these per side for the duration of a run. Pools
/// hand out a separate connection to every concurrent caller.
#[async_trait]
pub trait DatabaseConnection: Send + Sync {
    /// The dialect of this database.
    fn dialect(&self) -> &dyn Dialect;

    /// Whether the pool is still open.
    fn is_open(&self) -> bool;

    /// Round-trip a trivial query.
    async fn ping(&self) -> Result<()>;

    /// List user tables in the database's native listing order.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Ordered column definitions for a table.
    async fn get_columns(&self, table: &str) -> Result<Vec<ColumnDefinition>>;

    /// Execute a statement that returns no rows.
    async fn execute(&self, sql: &str) -> Result<u64>;

    /// Start streaming rows from a table.
    ///
    /// Returns a bounded channel receiver fed by a background task. The
    /// channel yields `Result<Batch>` until a batch marked final, then closes.
    fn read_table(&self, opts: ReadOptions) -> mpsc::Receiver<Result<Batch>>;

    /// Insert a batch of rows. Values must already be coerced to the
    /// canonical types of `columns`.
    async fn write_batch(
        &self,
        table: &str,
        columns: &[ColumnDefinition],
        batch: Batch,
    ) -> Result<u64>;

    /// Exact row count of a table.
    async fn row_count(&self, table: &str) -> Result<i64>;

    /// Close the pool.
    async fn close(&self);
}

/// Result of mapping a canonical type to a dialect's DDL vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMapping {
    /// Target type string (e.g., "VARCHAR(255)", "BIGINT").
    pub target_type: String,
    /// Whether this mapping loses data or precision.
    pub is_lossy: bool,
    /// Warning message for lossy mappings.
    pub warning: Option<String>,
}

impl TypeMapping {
    /// Create a lossless type mapping.
    pub fn lossless(target_type: impl Into<String>) -> Self {
        Self {
            target_type: target_type.into(),
            is_lossy: false,
            warning: None,
        }
    }

    /// Create a lossy type mapping with a warning.
    pub fn lossy(target_type: impl Into<String>, warning: impl Into<String>) -> Self {
        Self {
            target_type: target_type.into(),
            is_lossy: true,
            warning: Some(warning.into()),
        }
    }
}
