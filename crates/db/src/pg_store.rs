//! Postgres-backed [`KvStore`] over the `kv_records` table.

use admix_core::store::{KvStore, StoreError};
use async_trait::async_trait;

use crate::DbPool;

/// Stores each record as a JSONB row keyed by its full key.
#[derive(Debug, Clone)]
pub struct PgKvStore {
    pool: DbPool,
}

impl PgKvStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// `LIKE` pattern matching keys that start with `prefix` literally.
fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
impl KvStore for PgKvStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        sqlx::query_scalar::<_, serde_json::Value>("SELECT record FROM kv_records WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)
    }

    async fn set(&self, key: &str, record: serde_json::Value) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO kv_records (key, record)
             VALUES ($1, $2)
             ON CONFLICT (key) DO UPDATE
                SET record = EXCLUDED.record, updated_at = NOW()",
        )
        .bind(key)
        .bind(record)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM kv_records WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        sqlx::query_scalar::<_, String>(
            r"SELECT key FROM kv_records WHERE key LIKE $1 ESCAPE '\' ORDER BY key",
        )
        .bind(like_prefix(prefix))
        .fetch_all(&self.pool)
        .await
        .map_err(backend)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool).await.map_err(backend)
    }
}
