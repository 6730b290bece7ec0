//! SQLite-backed key-value store.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use super::KeyValueStore;
use crate::errors::AppError;

/// Key-value store over the `kv` table.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let row = sqlx::query("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| row.get("value")))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO kv (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM kv WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use tempfile::TempDir;

    async fn open_store() -> (SqliteStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let pool = init_database(&temp_dir.path().join("nested").join("test.sqlite"))
            .await
            .expect("Failed to init DB");
        (SqliteStore::new(pool), temp_dir)
    }

    #[tokio::test]
    async fn test_set_get_overwrite_remove() {
        let (store, _dir) = open_store().await;

        assert_eq!(store.get("keepr-store-anon").await.unwrap(), None);

        store.set("keepr-store-anon", "{\"v\":1}").await.unwrap();
        store.set("keepr-store-anon", "{\"v\":2}").await.unwrap();
        assert_eq!(
            store.get("keepr-store-anon").await.unwrap().as_deref(),
            Some("{\"v\":2}")
        );

        store.remove("keepr-store-anon").await.unwrap();
        store.remove("keepr-store-anon").await.unwrap();
        assert_eq!(store.get("keepr-store-anon").await.unwrap(), None);
    }
}
