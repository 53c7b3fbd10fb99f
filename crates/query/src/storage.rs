//! Storage collaborator
//!
//! The narrow seam to the relational engine: a compiled statement goes
//! in, JSON rows or a write outcome come back. Nothing above this module
//! ever sees a database driver type, which keeps the compiler testable
//! against mock storage.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Number, Value};
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::{Column, Pool, Postgres, Row};

use crate::error::QueryResult;
use crate::query::types::CompiledQuery;

/// Result of a write statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteOutcome {
    /// Key returned by the statement's RETURNING clause, when one came back
    pub last_insert_id: Option<i64>,
    pub rows_affected: u64,
}

/// Contract every storage backend fulfils
#[async_trait]
pub trait Storage: Send + Sync {
    /// Run a read statement. Rows come back as JSON objects keyed by the
    /// projected output names.
    async fn fetch(&self, query: &CompiledQuery) -> QueryResult<Vec<Value>>;

    /// Run a write statement. Statements carry a RETURNING clause, so the
    /// affected count is the number of returned keys.
    async fn execute(&self, query: &CompiledQuery) -> QueryResult<WriteOutcome>;
}

/// Pool tuning for the Postgres backend
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

/// sqlx-backed Postgres storage
#[derive(Debug, Clone)]
pub struct PgStorage {
    pool: Pool<Postgres>,
}

impl PgStorage {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Connect with default pool settings
    pub async fn connect(database_url: &str) -> QueryResult<Self> {
        Self::connect_with_config(database_url, StorageConfig::default()).await
    }

    pub async fn connect_with_config(
        database_url: &str,
        config: StorageConfig,
    ) -> QueryResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .connect(database_url)
            .await?;
        tracing::info!(
            "storage pool created (max_connections: {})",
            config.max_connections
        );
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn fetch(&self, query: &CompiledQuery) -> QueryResult<Vec<Value>> {
        let rows = bind_params(query).fetch_all(&self.pool).await.map_err(|e| {
            tracing::error!("storage fetch failed: {}", e);
            e
        })?;
        tracing::debug!("fetch returned {} rows", rows.len());
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn execute(&self, query: &CompiledQuery) -> QueryResult<WriteOutcome> {
        let rows = bind_params(query).fetch_all(&self.pool).await.map_err(|e| {
            tracing::error!("storage execute failed: {}", e);
            e
        })?;
        let last_insert_id = rows
            .first()
            .and_then(|row| decode_column(row, 0).as_i64());
        Ok(WriteOutcome {
            last_insert_id,
            rows_affected: rows.len() as u64,
        })
    }
}

/// Bind JSON parameter values by kind. Integers stay integers so ids and
/// tenant keys compare against integer columns without casts.
fn bind_params(compiled: &CompiledQuery) -> sqlx::query::Query<'_, Postgres, PgArguments> {
    let mut query = sqlx::query(&compiled.statement);
    for value in &compiled.params {
        query = match value {
            Value::Null => query.bind(Option::<String>::None),
            Value::Bool(flag) => query.bind(*flag),
            Value::Number(number) => {
                if let Some(int) = number.as_i64() {
                    query.bind(int)
                } else if let Some(float) = number.as_f64() {
                    query.bind(float)
                } else {
                    query.bind(number.to_string())
                }
            }
            Value::String(text) => query.bind(text.as_str()),
            other => query.bind(other.clone()),
        };
    }
    query
}

fn row_to_json(row: &PgRow) -> Value {
    let mut object = Map::new();
    for column in row.columns() {
        object.insert(column.name().to_string(), decode_column(row, column.ordinal()));
    }
    Value::Object(object)
}

/// Decode one column into JSON, trying concrete Postgres types from most
/// to least common. Types outside the cascade decode as null.
fn decode_column(row: &PgRow, index: usize) -> Value {
    if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
        return value.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(value) = row.try_get::<Option<i32>, _>(index) {
        return value.map(|v| Value::from(v as i64)).unwrap_or(Value::Null);
    }
    if let Ok(value) = row.try_get::<Option<i16>, _>(index) {
        return value.map(|v| Value::from(v as i64)).unwrap_or(Value::Null);
    }
    if let Ok(value) = row.try_get::<Option<f64>, _>(index) {
        return value
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }
    if let Ok(value) = row.try_get::<Option<f32>, _>(index) {
        return value
            .and_then(|v| Number::from_f64(v as f64))
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }
    if let Ok(value) = row.try_get::<Option<bool>, _>(index) {
        return value.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(value) = row.try_get::<Option<String>, _>(index) {
        return value.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(value) = row.try_get::<Option<uuid::Uuid>, _>(index) {
        return value
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null);
    }
    if let Ok(value) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index) {
        return value
            .map(|v| Value::String(v.to_rfc3339()))
            .unwrap_or(Value::Null);
    }
    if let Ok(value) = row.try_get::<Option<chrono::NaiveDateTime>, _>(index) {
        return value
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null);
    }
    if let Ok(value) = row.try_get::<Option<chrono::NaiveDate>, _>(index) {
        return value
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null);
    }
    if let Ok(value) = row.try_get::<Option<Value>, _>(index) {
        return value.unwrap_or(Value::Null);
    }
    Value::Null
}
