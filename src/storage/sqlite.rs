use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use super::{BlobStore, MIGRATION_001_KEY_VALUES, StorageError};

/// SQLite primary result code for "database or disk is full".
const SQLITE_FULL: &str = "13";

/// Blob store backed by a single SQLite table.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new store with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Create the key-value table if needed.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_KEY_VALUES)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Open (creating if missing) the database file at `path` and migrate it.
    pub async fn open(path: &str) -> Result<Self> {
        let store = Self::connect(&format!("sqlite:{}?mode=rwc", path)).await?;
        store.migrate().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn map_write_error(key: &str, err: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db_err) = &err {
        let full = db_err.code().as_deref() == Some(SQLITE_FULL)
            || db_err.message().contains("database or disk is full");
        if full {
            return StorageError::QuotaExceeded {
                key: key.to_string(),
            };
        }
    }
    StorageError::Backend(anyhow::Error::new(err).context(format!("Failed to write '{}'", key)))
}

impl BlobStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let row = sqlx::query("SELECT value FROM key_values WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to read '{}'", key))?;

        Ok(row.map(|row| row.get("value")))
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO key_values (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|err| map_write_error(key, err))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_put_overwrites_value() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("store.db");
        let store = SqliteStore::open(path.to_str().unwrap()).await?;

        assert_eq!(store.get("delicias-finance").await?, None);
        store.put("delicias-finance", "{\"a\":1}").await?;
        store.put("delicias-finance", "{\"a\":2}").await?;
        assert_eq!(
            store.get("delicias-finance").await?.as_deref(),
            Some("{\"a\":2}")
        );

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM key_values")
            .fetch_one(store.pool())
            .await?;
        assert_eq!(count, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("store.db");
        {
            let store = SqliteStore::open(path.to_str().unwrap()).await?;
            store.put("k", "v").await?;
            store.pool().close().await;
        }
        let store = SqliteStore::open(path.to_str().unwrap()).await?;
        assert_eq!(store.get("k").await?.as_deref(), Some("v"));
        Ok(())
    }
}
