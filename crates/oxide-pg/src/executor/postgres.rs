//! sqlx-backed Postgres connection.

use std::fmt;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions, PgRow};
use sqlx::{Column as _, Executor as _, Postgres, Row as _, Transaction, TypeInfo as _, ValueRef as _};

use crate::coder::RawValue;
use crate::error::{Error, Result};
use crate::value::Value;

use super::{ColumnInfo, RowSet, SqlConnection};

/// A pooled Postgres connection with an optional open transaction.
///
/// Statements go over the simple-query protocol, so every column arrives
/// as text; common scalar types are decoded here and the rest is handed
/// on as a text buffer.
pub struct PgClient {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgClient {
    /// Connects to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Database`] when the pool cannot connect.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new().connect(url).await?;
        Ok(Self::from_pool(pool))
    }

    /// Wraps an existing pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool, tx: None }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl fmt::Debug for PgClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgClient")
            .field("pool", &self.pool)
            .field("in_transaction", &self.tx.is_some())
            .finish()
    }
}

impl SqlConnection for PgClient {
    async fn query_rows(&mut self, sql: &str) -> Result<RowSet> {
        let rows = match self.tx.as_mut() {
            Some(tx) => {
                let conn: &mut PgConnection = tx;
                conn.fetch_all(sqlx::raw_sql(sql)).await?
            }
            None => sqlx::raw_sql(sql).fetch_all(&self.pool).await?,
        };
        let columns = rows
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|c| ColumnInfo::new(c.name(), c.type_info().name()))
                    .collect()
            })
            .unwrap_or_default();
        let rows = rows.iter().map(scan_row).collect::<Result<Vec<_>>>()?;
        Ok(RowSet { columns, rows })
    }

    async fn exec(&mut self, sql: &str) -> Result<u64> {
        let result = match self.tx.as_mut() {
            Some(tx) => {
                let conn: &mut PgConnection = tx;
                conn.execute(sqlx::raw_sql(sql)).await?
            }
            None => sqlx::raw_sql(sql).execute(&self.pool).await?,
        };
        Ok(result.rows_affected())
    }

    async fn begin(&mut self) -> Result<()> {
        if self.tx.is_some() {
            return Err(Error::TransactionState(
                "a transaction is already open".to_string(),
            ));
        }
        self.tx = Some(self.pool.begin().await?);
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| Error::TransactionState("no open transaction".to_string()))?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| Error::TransactionState("no open transaction".to_string()))?;
        tx.rollback().await?;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }
}

fn typed<T>(value: Option<T>, wrap: impl FnOnce(T) -> Value) -> RawValue {
    value.map_or(RawValue::Null, |v| RawValue::Typed(wrap(v)))
}

fn scan_row(row: &PgRow) -> Result<Vec<RawValue>> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, column)| -> Result<RawValue> {
            let raw = match column.type_info().name() {
                "BOOL" => typed(row.try_get::<Option<bool>, _>(i)?, Value::Bool),
                "INT2" => typed(row.try_get::<Option<i16>, _>(i)?, |v| Value::Int(v.into())),
                "INT4" => typed(row.try_get::<Option<i32>, _>(i)?, |v| Value::Int(v.into())),
                "INT8" => typed(row.try_get::<Option<i64>, _>(i)?, Value::Int),
                "FLOAT4" => typed(row.try_get::<Option<f32>, _>(i)?, |v| Value::Float(v.into())),
                "FLOAT8" => typed(row.try_get::<Option<f64>, _>(i)?, Value::Float),
                "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
                    typed(row.try_get::<Option<String>, _>(i)?, Value::Text)
                }
                "TIMESTAMPTZ" => typed(
                    row.try_get::<Option<DateTime<Utc>>, _>(i)?,
                    Value::Timestamp,
                ),
                "JSON" | "JSONB" => typed(
                    row.try_get::<Option<serde_json::Value>, _>(i)?,
                    Value::Json,
                ),
                _ => {
                    let value = row.try_get_raw(i)?;
                    if value.is_null() {
                        RawValue::Null
                    } else {
                        let bytes = value
                            .as_bytes()
                            .map_err(|e| Error::coercion(e.to_string()).at_column(column.name()))?;
                        RawValue::Bytes(bytes.to_vec())
                    }
                }
            };
            Ok(raw)
        })
        .collect()
}
