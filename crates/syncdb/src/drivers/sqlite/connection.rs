//! SQLite connection pool.
//!
//! Uses SQLx for pooling and async query execution. Values are decoded by
//! their storage class (INTEGER, REAL, TEXT, BLOB) rather than by declared
//! column type, since SQLite does not enforce the latter.

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use rust_decimal::prelude::ToPrimitive;
use sqlx::query::Query;
use sqlx::sqlite::{
    Sqlite, SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Row, TypeInfo, ValueRef};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::ConnectionDescriptor;
use crate::core::schema::{ColumnDefinition, TypeHints};
use crate::core::traits::{DatabaseConnection, Dialect, ReadOptions};
use crate::core::value::{Batch, SqlNullType, SqlValue, DATETIME_FORMAT, DATE_FORMAT};
use crate::error::{Result, SyncError};

use super::dialect::{has_boolean_check, SqliteDialect};

/// Batches buffered between the reader task and the consumer.
const READ_AHEAD_BATCHES: usize = 4;

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// SQLite database connection.
pub struct SqliteConnection {
    pool: SqlitePool,
    dialect: SqliteDialect,
}

impl SqliteConnection {
    /// Open a pool on the descriptor's file, creating it if missing.
    pub async fn connect(
        desc: &ConnectionDescriptor,
        max_conns: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let options = if desc.is_memory() {
            SqliteConnectOptions::new().in_memory(true)
        } else {
            SqliteConnectOptions::new()
                .filename(&desc.path)
                .create_if_missing(true)
        }
        .busy_timeout(timeout);

        // Every connection to :memory: is its own database
        let max_conns = if desc.is_memory() { 1 } else { max_conns.max(1) };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_conns)
            .min_connections(if desc.is_memory() { 1 } else { 0 })
            .idle_timeout(None)
            .max_lifetime(None)
            .acquire_timeout(timeout)
            .connect_with(options)
            .await
            .map_err(|e| SyncError::pool(e, "creating SQLite pool"))?;

        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| SyncError::pool(e, "testing SQLite connection"))?;

        info!("Connected to SQLite database: {}", desc.redacted());

        Ok(Self {
            pool,
            dialect: SqliteDialect::new(),
        })
    }

    fn row_to_values(row: &SqliteRow, columns: &[ColumnDefinition]) -> Result<Vec<SqlValue<'static>>> {
        columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                let raw = row.try_get_raw(i)?;
                if raw.is_null() {
                    return Ok(SqlValue::Null(SqlNullType::for_canonical(&col.canonical_type)));
                }
                let storage = raw.type_info().name().to_string();
                let value = match storage.as_str() {
                    "INTEGER" => SqlValue::I64(row.try_get::<i64, _>(i)?),
                    "REAL" => SqlValue::F64(row.try_get::<f64, _>(i)?),
                    "BLOB" => SqlValue::Bytes(Cow::Owned(row.try_get::<Vec<u8>, _>(i)?)),
                    _ => SqlValue::Text(Cow::Owned(row.try_get::<String, _>(i)?)),
                };
                Ok(value)
            })
            .collect()
    }

    fn bind_value<'q>(query: SqliteQuery<'q>, value: &SqlValue<'_>) -> SqliteQuery<'q> {
        match value {
            SqlValue::Null(_) => query.bind(None::<String>),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::I32(v) => query.bind(*v),
            SqlValue::I64(v) => query.bind(*v),
            SqlValue::F32(v) => query.bind(f64::from(*v)),
            SqlValue::F64(v) => query.bind(*v),
            // Decimal columns have REAL storage on SQLite
            SqlValue::Decimal(d) => query.bind(d.to_f64()),
            SqlValue::Text(s) => query.bind(s.to_string()),
            SqlValue::Bytes(b) => query.bind(b.to_vec()),
            SqlValue::DateTime(dt) => query.bind(dt.format(DATETIME_FORMAT).to_string()),
            SqlValue::Date(d) => query.bind(d.format(DATE_FORMAT).to_string()),
        }
    }

    async fn read_table_impl(
        pool: SqlitePool,
        sql: String,
        opts: ReadOptions,
        tx: mpsc::Sender<Result<Batch>>,
    ) -> Result<()> {
        let batch_size = opts.batch_size.max(1);
        let mut rows = sqlx::query(&sql).fetch(&pool);
        let mut buf = Vec::with_capacity(batch_size);

        while let Some(row) = rows.try_next().await? {
            buf.push(Self::row_to_values(&row, &opts.columns)?);
            if buf.len() >= batch_size {
                let batch = Batch::new(std::mem::replace(&mut buf, Vec::with_capacity(batch_size)));
                if tx.send(Ok(batch)).await.is_err() {
                    debug!("{}: reader stopped, receiver dropped", opts.table);
                    return Ok(());
                }
            }
        }

        let _ = tx.send(Ok(Batch::new(buf).mark_final())).await;
        Ok(())
    }
}

#[async_trait]
impl DatabaseConnection for SqliteConnection {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn is_open(&self) -> bool {
        !self.pool.is_closed()
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(tables)
    }

    async fn get_columns(&self, table: &str) -> Result<Vec<ColumnDefinition>> {
        let create_sql: Option<Option<String>> = sqlx::query_scalar(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_optional(&self.pool)
        .await?;
        let create_sql = create_sql
            .ok_or_else(|| SyncError::Introspection(format!("table '{}' not found", table)))?
            .unwrap_or_default();

        let rows: Vec<SqliteRow> =
            sqlx::query(&format!("PRAGMA table_info({})", self.dialect.quote_ident(table)))
                .fetch_all(&self.pool)
                .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get("name")?;
            let declared: String = row.try_get("type")?;
            let not_null: i64 = row.try_get("notnull")?;
            let pk: i64 = row.try_get("pk")?;

            let hints = TypeHints::boolean_check(has_boolean_check(&create_sql, &name));
            let canonical = self.dialect.native_type_to_canonical(&declared, &hints);

            let mut col = ColumnDefinition::new(name, canonical).with_native_type(declared);
            if not_null != 0 {
                col = col.not_null();
            }
            col.is_primary_key = pk > 0;
            columns.push(col);
        }
        Ok(columns)
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        let result = sqlx::query(sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    fn read_table(&self, opts: ReadOptions) -> mpsc::Receiver<Result<Batch>> {
        let (tx, rx) = mpsc::channel(READ_AHEAD_BATCHES);
        let pool = self.pool.clone();
        let sql = self.dialect.build_select(&opts);

        tokio::spawn(async move {
            if let Err(e) = Self::read_table_impl(pool, sql, opts, tx.clone()).await {
                let _ = tx.send(Err(e)).await;
            }
        });

        rx
    }

    async fn write_batch(
        &self,
        table: &str,
        columns: &[ColumnDefinition],
        batch: Batch,
    ) -> Result<u64> {
        if batch.is_empty() || columns.is_empty() {
            return Ok(0);
        }

        let chunk_rows = self.dialect.max_rows_per_insert(columns.len());
        let mut tx = self.pool.begin().await?;
        let mut written = 0u64;

        for chunk in batch.rows.chunks(chunk_rows) {
            let sql = self.dialect.build_insert(table, columns, chunk.len());
            let mut query = sqlx::query(&sql);
            for row in chunk {
                for value in row {
                    query = Self::bind_value(query, value);
                }
            }
            written += query.execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(written)
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.dialect.quote_ident(table));
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
