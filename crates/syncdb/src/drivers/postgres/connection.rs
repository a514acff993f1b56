//! PostgreSQL connection pool.
//!
//! Uses tokio-postgres with deadpool-postgres for pooling. Reads stream rows
//! through `query_raw` and decode by the column's wire type. Writes bind every
//! value as text; the INSERT casts each parameter to the target column type.

use std::borrow::Cow;
use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod, Runtime};
use futures::{pin_mut, TryStreamExt};
use tokio::sync::mpsc;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Config as PgConfig, Row};
use tracing::{debug, info, warn};

use crate::config::ConnectionDescriptor;
use crate::core::schema::{ColumnDefinition, TypeHints};
use crate::core::traits::{DatabaseConnection, Dialect, ReadOptions};
use crate::core::value::{Batch, SqlNullType, SqlValue};
use crate::drivers::common::{postgres_connector, SslMode};
use crate::error::{Result, SyncError};

use super::dialect::PostgresDialect;

/// Batches buffered between the reader task and the consumer.
const READ_AHEAD_BATCHES: usize = 4;

/// PostgreSQL database connection.
pub struct PostgresConnection {
    pool: Pool,
    dialect: PostgresDialect,
}

impl PostgresConnection {
    /// Open a pool on the descriptor's database.
    pub async fn connect(
        desc: &ConnectionDescriptor,
        max_conns: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config
            .host(&desc.host)
            .port(desc.port())
            .dbname(&desc.database)
            .application_name("syncdb")
            .connect_timeout(timeout);
        if !desc.user.is_empty() {
            pg_config.user(&desc.user);
        }
        if !desc.password.is_empty() {
            pg_config.password(&desc.password);
        }

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let max_size = (max_conns as usize).max(1);

        let pool = match postgres_connector(SslMode::parse(&desc.ssl_mode)?)? {
            None => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                let mgr = Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config);
                Pool::builder(mgr)
                    .max_size(max_size)
                    .wait_timeout(Some(timeout))
                    .runtime(Runtime::Tokio1)
                    .build()
                    .map_err(|e| SyncError::pool(e, "creating PostgreSQL pool"))?
            }
            Some(tls_connector) => {
                let mgr = Manager::from_config(pg_config, tls_connector, mgr_config);
                Pool::builder(mgr)
                    .max_size(max_size)
                    .wait_timeout(Some(timeout))
                    .runtime(Runtime::Tokio1)
                    .build()
                    .map_err(|e| SyncError::pool(e, "creating PostgreSQL pool"))?
            }
        };

        let client = pool
            .get()
            .await
            .map_err(|e| SyncError::pool(e, "testing PostgreSQL connection"))?;
        client.simple_query("SELECT 1").await?;
        drop(client);

        info!("Connected to PostgreSQL: {}", desc.redacted());

        Ok(Self {
            pool,
            dialect: PostgresDialect::new(),
        })
    }

    async fn client(&self, context: &str) -> Result<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| SyncError::pool(e, context))
    }
}

#[async_trait]
impl DatabaseConnection for PostgresConnection {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn is_open(&self) -> bool {
        !self.pool.is_closed()
    }

    async fn ping(&self) -> Result<()> {
        let client = self.client("ping").await?;
        client.simple_query("SELECT 1").await?;
        Ok(())
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let client = self.client("listing tables").await?;
        let rows = client
            .query(
                r#"
                SELECT table_name::text
                FROM information_schema.tables
                WHERE table_schema = current_schema() AND table_type = 'BASE TABLE'
                "#,
                &[],
            )
            .await?;
        rows.iter()
            .map(|row| row.try_get::<_, String>(0).map_err(SyncError::from))
            .collect()
    }

    async fn get_columns(&self, table: &str) -> Result<Vec<ColumnDefinition>> {
        let client = self.client("loading columns").await?;

        let query = r#"
            SELECT
                c.column_name::text,
                c.udt_name::text,
                COALESCE(c.character_maximum_length, 0)::int4,
                COALESCE(c.numeric_precision, 0)::int4,
                COALESCE(c.numeric_scale, 0)::int4,
                c.is_nullable = 'YES',
                EXISTS (
                    SELECT 1
                    FROM information_schema.table_constraints tc
                    JOIN information_schema.key_column_usage kcu
                      ON kcu.constraint_schema = tc.constraint_schema
                     AND kcu.constraint_name = tc.constraint_name
                     AND kcu.table_name = tc.table_name
                    WHERE tc.constraint_type = 'PRIMARY KEY'
                      AND tc.table_schema = c.table_schema
                      AND tc.table_name = c.table_name
                      AND kcu.column_name = c.column_name
                )
            FROM information_schema.columns c
            WHERE c.table_schema = current_schema() AND c.table_name = $1
            ORDER BY c.ordinal_position
        "#;

        let rows = client.query(query, &[&table]).await?;
        if rows.is_empty() {
            return Err(SyncError::Introspection(format!(
                "table '{}' not found",
                table
            )));
        }

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get(0)?;
            let udt_name: String = row.try_get(1)?;
            let hints = TypeHints {
                max_length: u32::try_from(row.try_get::<_, i32>(2)?)
                    .ok()
                    .filter(|n| *n > 0),
                precision: u16::try_from(row.try_get::<_, i32>(3)?)
                    .ok()
                    .filter(|n| *n > 0),
                scale: u16::try_from(row.try_get::<_, i32>(4)?).ok(),
                boolean_check: false,
            };
            let canonical = self.dialect.native_type_to_canonical(&udt_name, &hints);

            let mut col = ColumnDefinition::new(name, canonical).with_native_type(udt_name);
            if !row.try_get::<_, bool>(5)? {
                col = col.not_null();
            }
            col.is_primary_key = row.try_get::<_, bool>(6)?;
            columns.push(col);
        }

        debug!("Loaded {} columns for {}", columns.len(), table);
        Ok(columns)
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        let client = self.client("executing statement").await?;
        Ok(client.execute(sql, &[]).await?)
    }

    fn read_table(&self, opts: ReadOptions) -> mpsc::Receiver<Result<Batch>> {
        let (tx, rx) = mpsc::channel(READ_AHEAD_BATCHES);
        let pool = self.pool.clone();
        let sql = self.dialect.build_select(&opts);

        tokio::spawn(async move {
            if let Err(e) = read_table_internal(pool, sql, opts, tx.clone()).await {
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
        let mut client = self.client("write_batch").await?;
        let tx = client.transaction().await?;
        let mut written = 0u64;

        for chunk in batch.rows.chunks(chunk_rows) {
            let sql = self.dialect.build_insert(table, columns, chunk.len());
            let params: Vec<Option<String>> = chunk
                .iter()
                .flat_map(|row| row.iter().map(value_to_text))
                .collect();
            let refs: Vec<&(dyn ToSql + Sync)> = params
                .iter()
                .map(|p| p as &(dyn ToSql + Sync))
                .collect();
            written += tx.execute(sql.as_str(), &refs).await?;
        }

        tx.commit().await?;
        Ok(written)
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        let client = self.client("counting rows").await?;
        let sql = format!("SELECT COUNT(*) FROM {}", self.dialect.quote_ident(table));
        let row = client.query_one(sql.as_str(), &[]).await?;
        Ok(row.try_get::<_, i64>(0)?)
    }

    async fn close(&self) {
        self.pool.close();
    }
}

async fn read_table_internal(
    pool: Pool,
    sql: String,
    opts: ReadOptions,
    tx: mpsc::Sender<Result<Batch>>,
) -> Result<()> {
    let client = pool
        .get()
        .await
        .map_err(|e| SyncError::pool(e, "getting connection for read_table"))?;

    let batch_size = opts.batch_size.max(1);
    let stream = client
        .query_raw(sql.as_str(), [] as [&(dyn ToSql + Sync); 0])
        .await?;
    pin_mut!(stream);

    let mut buf = Vec::with_capacity(batch_size);
    while let Some(row) = stream.try_next().await? {
        buf.push(row_to_values(&row, &opts.columns)?);
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

/// Decode one row by the wire type of each column.
fn row_to_values(row: &Row, columns: &[ColumnDefinition]) -> Result<Vec<SqlValue<'static>>> {
    columns
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let ty = row.columns()[i].type_();
            let value = match ty {
                t if *t == Type::BOOL => row.try_get::<_, Option<bool>>(i)?.map(SqlValue::Bool),
                t if *t == Type::INT2 => row
                    .try_get::<_, Option<i16>>(i)?
                    .map(|v| SqlValue::I32(i32::from(v))),
                t if *t == Type::INT4 => row.try_get::<_, Option<i32>>(i)?.map(SqlValue::I32),
                t if *t == Type::INT8 => row.try_get::<_, Option<i64>>(i)?.map(SqlValue::I64),
                t if *t == Type::FLOAT4 => row.try_get::<_, Option<f32>>(i)?.map(SqlValue::F32),
                t if *t == Type::FLOAT8 => row.try_get::<_, Option<f64>>(i)?.map(SqlValue::F64),
                t if *t == Type::NUMERIC => row
                    .try_get::<_, Option<rust_decimal::Decimal>>(i)?
                    .map(SqlValue::Decimal),
                t if *t == Type::TIMESTAMP => row
                    .try_get::<_, Option<chrono::NaiveDateTime>>(i)?
                    .map(SqlValue::DateTime),
                t if *t == Type::TIMESTAMPTZ => row
                    .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(i)?
                    .map(|v| SqlValue::DateTime(v.naive_utc())),
                t if *t == Type::DATE => row
                    .try_get::<_, Option<chrono::NaiveDate>>(i)?
                    .map(SqlValue::Date),
                t if *t == Type::BYTEA => row
                    .try_get::<_, Option<Vec<u8>>>(i)?
                    .map(|b| SqlValue::Bytes(Cow::Owned(b))),
                t if *t == Type::UUID => row
                    .try_get::<_, Option<uuid::Uuid>>(i)?
                    .map(|u| SqlValue::Text(Cow::Owned(u.to_string()))),
                t if *t == Type::JSON || *t == Type::JSONB => row
                    .try_get::<_, Option<serde_json::Value>>(i)?
                    .map(|v| SqlValue::Text(Cow::Owned(v.to_string()))),
                _ => row
                    .try_get::<_, Option<String>>(i)?
                    .map(|s| SqlValue::Text(Cow::Owned(s))),
            };
            Ok(value.unwrap_or_else(|| SqlValue::Null(SqlNullType::for_canonical(&col.canonical_type))))
        })
        .collect()
}

/// Text form of a value as PostgreSQL's input functions expect it.
fn value_to_text(value: &SqlValue<'_>) -> Option<String> {
    match value {
        SqlValue::Bytes(b) => {
            let mut s = String::with_capacity(2 + b.len() * 2);
            s.push_str("\\x");
            for byte in b.iter() {
                let _ = write!(s, "{:02x}", byte);
            }
            Some(s)
        }
        other => other.to_text(),
    }
}
