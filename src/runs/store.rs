use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::db::Db;
use crate::error::Result;

/// String key-value persistence for saved runs.
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn remove(&self, key: &str) -> Result<()>;
    /// Keys starting with `prefix`, sorted.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>>;
}

/// `RunStore` backed by one SQLite table.
pub struct SqliteRunStore {
    db: Db,
}

impl SqliteRunStore {
    /// Open the store, creating its table on first use.
    pub async fn open(db: Db) -> Result<Self> {
        db.with_connection(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS saved_runs (
                    key        TEXT PRIMARY KEY,
                    value      TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );",
            )?;
            Ok(())
        })
        .await?;
        log::debug!("Saved-run store ready at {}", db.path().display());
        Ok(Self { db })
    }
}

#[async_trait]
impl RunStore for SqliteRunStore {
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.db
            .with_connection(move |conn| {
                conn.execute(
                    "INSERT INTO saved_runs (key, value, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                    params![key, value, Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.db
            .with_connection(move |conn| {
                let value: Option<String> = conn
                    .query_row(
                        "SELECT value FROM saved_runs WHERE key = ?1",
                        params![key],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(value)
            })
            .await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.db
            .with_connection(move |conn| {
                conn.execute("DELETE FROM saved_runs WHERE key = ?1", params![key])?;
                Ok(())
            })
            .await
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix = prefix.to_string();
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT key FROM saved_runs WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
                )?;
                let keys = stmt
                    .query_map(params![prefix], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                Ok(keys)
            })
            .await
    }
}

/// Process-local `RunStore`, for runs that need not outlive the process.
#[derive(Default)]
pub struct MemoryRunStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_sqlite_set_get_overwrite_remove() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteRunStore::open(Db::new(temp_dir.path().join("runs.db")))
            .await
            .unwrap();

        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", "one").await.unwrap();
        store.set("k", "two").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("two"));

        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        store.remove("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_sqlite_store_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("runs.db");

        let store = SqliteRunStore::open(Db::new(&path)).await.unwrap();
        store.set("k", "v").await.unwrap();
        drop(store);

        let reopened = SqliteRunStore::open(Db::new(&path)).await.unwrap();
        assert_eq!(reopened.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_sqlite_keys_by_literal_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteRunStore::open(Db::new(temp_dir.path().join("runs.db")))
            .await
            .unwrap();
        for key in ["run_b", "run_a", "runXa", "other"] {
            store.set(key, "{}").await.unwrap();
        }

        assert_eq!(store.keys("run_").await.unwrap(), vec!["run_a", "run_b"]);
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryRunStore::new();
        store.set("a", "1").await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
        store.set("b", "2").await.unwrap();
        assert_eq!(store.keys("").await.unwrap(), vec!["a", "b"]);
        store.remove("a").await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());
    }
}
