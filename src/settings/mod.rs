//! Settings service and version ledger.
//!
//! Runtime state of an installation lives in a single `settings` table of
//! key/value rows: the installed version marker, the cached release
//! response, the API rate-limit counters and the update checkpoint.
//!
//! [`SettingsStore`] is created once per command and handed to every
//! component that needs it. Reads through [`get`](SettingsStore::get) always
//! hit the database; [`cached`](SettingsStore::cached) serves the snapshot
//! taken by the last [`reload`](SettingsStore::reload), which writes through
//! this store keep current.
//!
//! Writes are upserts with last-write-wins semantics. Concurrent pipeline
//! runs are prevented by the update lock, not here.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use crate::constants::{DEFAULT_VERSION, VERSION_KEY};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS settings (
    key   TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
)
";

/// Key/value settings backed by SQLite.
#[derive(Debug)]
pub struct SettingsStore {
    pool: SqlitePool,
    snapshot: RwLock<BTreeMap<String, String>>,
}

impl SettingsStore {
    /// Open (creating if missing) the database at `path` and ensure the
    /// settings table exists.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }

        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(opts)
            .await
            .with_context(|| format!("Failed to open settings database {}", path.display()))?;

        debug!("Opened settings database at {}", path.display());
        Self::from_pool(pool).await
    }

    /// An in-memory store, used by tests and dry runs.
    ///
    /// The pool is pinned to a single connection that never expires, since
    /// every SQLite in-memory connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")
            .context("Invalid in-memory database URL")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await
            .context("Failed to open in-memory settings database")?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, creating the schema if needed.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .context("Failed to create settings table")?;

        let store = Self {
            pool,
            snapshot: RwLock::new(BTreeMap::new()),
        };
        store.reload().await?;
        Ok(store)
    }

    /// The underlying pool, for components that run their own SQL
    /// (the migration applier).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Read a value, falling back to `default` when the key is absent.
    pub async fn get(&self, key: &str, default: &str) -> Result<String> {
        Ok(self.get_opt(key).await?.unwrap_or_else(|| default.to_string()))
    }

    /// Read a value if present.
    pub async fn get_opt(&self, key: &str) -> Result<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to read setting '{key}'"))
    }

    /// Insert or update a value.
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to write setting '{key}'"))?;

        self.snapshot.write().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Remove a key. Returns whether a row was deleted.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete setting '{key}'"))?;

        self.snapshot.write().await.remove(key);
        Ok(result.rows_affected() > 0)
    }

    /// All settings, ordered by key.
    pub async fn all(&self) -> Result<BTreeMap<String, String>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT key, value FROM settings ORDER BY key",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list settings")?;
        Ok(rows.into_iter().collect())
    }

    /// Refresh the in-memory snapshot from the database.
    pub async fn reload(&self) -> Result<()> {
        let all = self.all().await?;
        debug!("Reloaded {} settings", all.len());
        *self.snapshot.write().await = all;
        Ok(())
    }

    /// Value from the snapshot taken by the last [`reload`](Self::reload).
    pub async fn cached(&self, key: &str) -> Option<String> {
        self.snapshot.read().await.get(key).cloned()
    }

    /// The installed version marker.
    pub async fn version(&self) -> Result<String> {
        self.get(VERSION_KEY, DEFAULT_VERSION).await
    }

    /// Record the installed version marker.
    pub async fn set_version(&self, version: &str) -> Result<()> {
        self.set(VERSION_KEY, version).await
    }

    /// Close the pool, flushing pending work.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_get_default_and_set() {
        let store = SettingsStore::in_memory().await.unwrap();
        assert_eq!(store.get("site_title", "My Films").await.unwrap(), "My Films");

        store.set("site_title", "DVD Shelf").await.unwrap();
        assert_eq!(store.get("site_title", "My Films").await.unwrap(), "DVD Shelf");
    }

    #[tokio::test]
    async fn test_set_is_upsert() {
        let store = SettingsStore::in_memory().await.unwrap();
        store.set("version", "1.4.7").await.unwrap();
        store.set("version", "1.4.8").await.unwrap();

        assert_eq!(store.version().await.unwrap(), "1.4.8");
        assert_eq!(store.all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_version_defaults() {
        let store = SettingsStore::in_memory().await.unwrap();
        assert_eq!(store.version().await.unwrap(), DEFAULT_VERSION);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = SettingsStore::in_memory().await.unwrap();
        store.set("k", "v").await.unwrap();
        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
        assert_eq!(store.get_opt("k").await.unwrap(), None);
        assert_eq!(store.cached("k").await, None);
    }

    #[tokio::test]
    async fn test_reload_picks_up_external_writes() {
        let store = SettingsStore::in_memory().await.unwrap();
        sqlx::query("INSERT INTO settings (key, value) VALUES ('items_per_page', '24')")
            .execute(store.pool())
            .await
            .unwrap();

        assert_eq!(store.cached("items_per_page").await, None);
        store.reload().await.unwrap();
        assert_eq!(store.cached("items_per_page").await.as_deref(), Some("24"));
    }

    #[tokio::test]
    async fn test_file_backed_store_persists() {
        let temp = TempDir::new().unwrap();
        let db = temp.path().join("data").join("reelshelf.db");

        let store = SettingsStore::open(&db).await.unwrap();
        store.set_version("2.0.0").await.unwrap();
        store.close().await;

        let reopened = SettingsStore::open(&db).await.unwrap();
        assert_eq!(reopened.version().await.unwrap(), "2.0.0");
        assert_eq!(reopened.cached("version").await.as_deref(), Some("2.0.0"));
    }
}
