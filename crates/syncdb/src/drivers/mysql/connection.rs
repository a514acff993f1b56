//! MySQL/MariaDB connection pool.
//!
//! Uses SQLx for pooling and async query execution. Row values are decoded
//! according to the canonical type of the column being read.

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use rust_decimal::Decimal;
use sqlx::mysql::{
    MySql, MySqlArguments, MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow,
    MySqlSslMode,
};
use sqlx::query::Query;
use sqlx::{Row, ValueRef};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ConnectionDescriptor;
use crate::core::schema::{CanonicalType, ColumnDefinition, TypeHints};
use crate::core::traits::{DatabaseConnection, Dialect, ReadOptions};
use crate::core::value::{Batch, SqlNullType, SqlValue};
use crate::drivers::common::SslMode;
use crate::error::{Result, SyncError};

use super::dialect::MysqlDialect;

/// Batches buffered between the reader task and the consumer.
const READ_AHEAD_BATCHES: usize = 4;

type MySqlQuery<'q> = Query<'q, MySql, MySqlArguments>;

/// MySQL/MariaDB database connection.
pub struct MysqlConnection {
    pool: MySqlPool,
    dialect: MysqlDialect,
}

impl From<SslMode> for MySqlSslMode {
    fn from(mode: SslMode) -> Self {
        match mode {
            SslMode::Disable => MySqlSslMode::Disabled,
            SslMode::Require => MySqlSslMode::Required,
            SslMode::VerifyCa => MySqlSslMode::VerifyCa,
            SslMode::VerifyFull => MySqlSslMode::VerifyIdentity,
        }
    }
}

impl MysqlConnection {
    /// Open a pool on the descriptor's database.
    pub async fn connect(
        desc: &ConnectionDescriptor,
        max_conns: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let ssl_mode = SslMode::parse(&desc.ssl_mode)?;
        if !ssl_mode.requires_tls() {
            warn!("MySQL TLS is disabled. Credentials will be transmitted in plaintext.");
        }

        let mut options = MySqlConnectOptions::new()
            .host(&desc.host)
            .port(desc.port())
            .database(&desc.database)
            .ssl_mode(ssl_mode.into())
            .charset("utf8mb4");
        if !desc.user.is_empty() {
            options = options.username(&desc.user);
        }
        if !desc.password.is_empty() {
            options = options.password(&desc.password);
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(max_conns.max(1))
            .acquire_timeout(timeout)
            .connect_with(options)
            .await
            .map_err(|e| SyncError::pool(e, "creating MySQL pool"))?;

        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| SyncError::pool(e, "testing MySQL connection"))?;

        info!("Connected to MySQL: {}", desc.redacted());

        Ok(Self {
            pool,
            dialect: MysqlDialect::new(),
        })
    }

    fn decode_integer(row: &MySqlRow, i: usize) -> Result<SqlValue<'static>> {
        match row.try_get::<i64, _>(i) {
            Ok(v) => Ok(SqlValue::I64(v)),
            Err(_) => {
                let v = row.try_get::<u64, _>(i)?;
                Ok(i64::try_from(v)
                    .map(SqlValue::I64)
                    .unwrap_or_else(|_| SqlValue::Decimal(Decimal::from(v))))
            }
        }
    }

    fn decode_text(row: &MySqlRow, i: usize) -> Result<SqlValue<'static>> {
        match row.try_get::<String, _>(i) {
            Ok(s) => Ok(SqlValue::Text(Cow::Owned(s))),
            Err(_) => {
                let bytes = row.try_get::<Vec<u8>, _>(i)?;
                let s = String::from_utf8(bytes)
                    .map_err(|e| SyncError::Coercion(format!("column {} is not UTF-8: {}", i, e)))?;
                Ok(SqlValue::Text(Cow::Owned(s)))
            }
        }
    }

    fn row_to_values(row: &MySqlRow, columns: &[ColumnDefinition]) -> Result<Vec<SqlValue<'static>>> {
        columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                if row.try_get_raw(i)?.is_null() {
                    return Ok(SqlValue::Null(SqlNullType::for_canonical(&col.canonical_type)));
                }

                let value = match &col.canonical_type {
                    CanonicalType::Boolean => match row.try_get::<bool, _>(i) {
                        Ok(b) => SqlValue::Bool(b),
                        Err(_) => match Self::decode_integer(row, i)? {
                            SqlValue::I64(v) => SqlValue::Bool(v != 0),
                            other => other,
                        },
                    },
                    CanonicalType::Integer | CanonicalType::BigInt => {
                        Self::decode_integer(row, i)?
                    }
                    CanonicalType::Float => SqlValue::F32(row.try_get::<f32, _>(i)?),
                    CanonicalType::Double => SqlValue::F64(row.try_get::<f64, _>(i)?),
                    CanonicalType::Decimal { .. } => SqlValue::Decimal(row.try_get::<Decimal, _>(i)?),
                    CanonicalType::Blob => SqlValue::Bytes(Cow::Owned(row.try_get::<Vec<u8>, _>(i)?)),
                    CanonicalType::DateTime => {
                        SqlValue::DateTime(row.try_get::<chrono::NaiveDateTime, _>(i)?)
                    }
                    CanonicalType::Date => SqlValue::Date(row.try_get::<chrono::NaiveDate, _>(i)?),
                    CanonicalType::Text | CanonicalType::Varchar(_) | CanonicalType::Unknown(_) => {
                        Self::decode_text(row, i)?
                    }
                };
                Ok(value)
            })
            .collect()
    }

    fn bind_value<'q>(query: MySqlQuery<'q>, value: &SqlValue<'_>) -> MySqlQuery<'q> {
        match value {
            SqlValue::Null(_) => query.bind(None::<String>),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::I32(v) => query.bind(*v),
            SqlValue::I64(v) => query.bind(*v),
            SqlValue::F32(v) => query.bind(*v),
            SqlValue::F64(v) => query.bind(*v),
            SqlValue::Decimal(d) => query.bind(*d),
            SqlValue::Text(s) => query.bind(s.to_string()),
            SqlValue::Bytes(b) => query.bind(b.to_vec()),
            SqlValue::DateTime(dt) => query.bind(*dt),
            SqlValue::Date(d) => query.bind(*d),
        }
    }

    async fn read_table_impl(
        pool: MySqlPool,
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
impl DatabaseConnection for MysqlConnection {
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
        // CAST to CHAR to handle collation differences
        let tables: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT CAST(TABLE_NAME AS CHAR(255)) AS TABLE_NAME
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE'
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(tables)
    }

    async fn get_columns(&self, table: &str) -> Result<Vec<ColumnDefinition>> {
        let query = r#"
            SELECT
                CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME,
                CAST(COLUMN_TYPE AS CHAR(255)) AS COLUMN_TYPE,
                CAST(COALESCE(CHARACTER_MAXIMUM_LENGTH, 0) AS SIGNED) AS max_length,
                CAST(COALESCE(NUMERIC_PRECISION, 0) AS SIGNED) AS num_precision,
                CAST(COALESCE(NUMERIC_SCALE, 0) AS SIGNED) AS num_scale,
                IF(IS_NULLABLE = 'YES', 1, 0) AS is_nullable,
                IF(COLUMN_KEY = 'PRI', 1, 0) AS is_pk
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
        "#;

        let rows: Vec<MySqlRow> = sqlx::query(query).bind(table).fetch_all(&self.pool).await?;
        if rows.is_empty() {
            return Err(SyncError::Introspection(format!(
                "table '{}' not found",
                table
            )));
        }

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get("COLUMN_NAME")?;
            let column_type: String = row.try_get("COLUMN_TYPE")?;
            let hints = TypeHints {
                max_length: u32::try_from(row.try_get::<i64, _>("max_length")?)
                    .ok()
                    .filter(|n| *n > 0),
                precision: u16::try_from(row.try_get::<i64, _>("num_precision")?)
                    .ok()
                    .filter(|n| *n > 0),
                scale: u16::try_from(row.try_get::<i64, _>("num_scale")?).ok(),
                boolean_check: false,
            };
            let canonical = self.dialect.native_type_to_canonical(&column_type, &hints);

            let mut col = ColumnDefinition::new(name, canonical).with_native_type(column_type);
            if row.try_get::<i64, _>("is_nullable")? == 0 {
                col = col.not_null();
            }
            col.is_primary_key = row.try_get::<i64, _>("is_pk")? == 1;
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
