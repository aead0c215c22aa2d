//! Cache store seam and its SQLite and in-memory implementations.
//!
//! The store is a key/value namespace: records are addressed by a stable
//! key inside a named partition. Reads and writes are atomic at single-key
//! granularity; nothing here requires cross-key transactions. Records are
//! only ever superseded by `put`, never evicted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::trace;

use crate::config::Config;
use crate::error::{Error, Result};

/// A record fetched from the store along with its persistence metadata.
#[derive(Debug, Clone)]
pub struct StoredRecord {
  pub record: Value,
  pub cached_at: DateTime<Utc>,
}

/// Asynchronous key/value storage partitioned into named namespaces.
#[async_trait]
pub trait Store: Send + Sync {
  /// Create the named partitions if they do not exist yet. Must complete
  /// before any `get` or `put`.
  async fn open(&self, partitions: &[&str]) -> Result<()>;

  async fn get(&self, key: &str, partition: &str) -> Result<Option<StoredRecord>>;

  /// Persist `record` under `key`, unconditionally overwriting any prior
  /// record.
  async fn put(&self, key: &str, record: &Value, partition: &str) -> Result<()>;
}

/// SQLite-backed store. All partitions share one table, discriminated by a
/// partition column.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

/// Schema for the record cache.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS record_cache (
    partition TEXT NOT NULL,
    record_key TEXT NOT NULL,
    data BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (partition, record_key)
);
"#;

impl SqliteStore {
  /// Open or create the database at the configured location, falling back
  /// to the platform default when `cache.db_path` is unset.
  pub fn from_config(config: &Config) -> Result<Self> {
    match &config.cache.db_path {
      Some(path) => Self::open_at(path),
      None => Self::open_default(),
    }
  }

  /// Open or create the database at the default location.
  pub fn open_default() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open or create the database at `path`.
  pub fn open_at(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| Error::store(format!("failed to create cache directory: {}", e)))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| Error::store(format!("failed to open {}: {}", path.display(), e)))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// Open a transient in-memory database.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory().map_err(Error::store)?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| Error::store("could not determine data directory"))?;

    Ok(data_dir.join("jira-cache").join("cache.db"))
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| Error::store(format!("lock poisoned: {}", e)))
  }
}

#[async_trait]
impl Store for SqliteStore {
  async fn open(&self, _partitions: &[&str]) -> Result<()> {
    // Partitions live in a column, so opening any set of them is the same
    // migration.
    let conn = self.lock()?;
    conn.execute_batch(SCHEMA).map_err(Error::store)?;
    Ok(())
  }

  async fn get(&self, key: &str, partition: &str) -> Result<Option<StoredRecord>> {
    let conn = self.lock()?;

    let mut stmt = conn
      .prepare("SELECT data, cached_at FROM record_cache WHERE partition = ? AND record_key = ?")
      .map_err(Error::store)?;

    let row: Option<(Vec<u8>, String)> = stmt
      .query_row(params![partition, key], |row| Ok((row.get(0)?, row.get(1)?)))
      .ok();

    let (data, cached_at) = match row {
      Some(row) => row,
      None => return Ok(None),
    };

    trace!(key, partition, "store hit");
    let record = serde_json::from_slice(&data)
      .map_err(|e| Error::store(format!("corrupt record for {}: {}", key, e)))?;

    Ok(Some(StoredRecord {
      record,
      cached_at: parse_datetime(&cached_at)?,
    }))
  }

  async fn put(&self, key: &str, record: &Value, partition: &str) -> Result<()> {
    let data = serde_json::to_vec(record).map_err(Error::store)?;

    let conn = self.lock()?;
    conn
      .execute(
        "INSERT OR REPLACE INTO record_cache (partition, record_key, data, cached_at)
         VALUES (?, ?, ?, datetime('now'))",
        params![partition, key, data],
      )
      .map_err(Error::store)?;

    trace!(key, partition, "record stored");
    Ok(())
  }
}

/// In-memory store. Clones share state, so a handle kept aside observes
/// writes made through the cache; useful for tests and short-lived runs.
#[derive(Clone, Default)]
pub struct MemoryStore {
  records: std::sync::Arc<Mutex<std::collections::HashMap<(String, String), StoredRecord>>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl Store for MemoryStore {
  async fn open(&self, _partitions: &[&str]) -> Result<()> {
    Ok(())
  }

  async fn get(&self, key: &str, partition: &str) -> Result<Option<StoredRecord>> {
    let records = self
      .records
      .lock()
      .map_err(|e| Error::store(format!("lock poisoned: {}", e)))?;
    Ok(records.get(&(partition.to_string(), key.to_string())).cloned())
  }

  async fn put(&self, key: &str, record: &Value, partition: &str) -> Result<()> {
    let mut records = self
      .records
      .lock()
      .map_err(|e| Error::store(format!("lock poisoned: {}", e)))?;
    records.insert(
      (partition.to_string(), key.to_string()),
      StoredRecord {
        record: record.clone(),
        cached_at: Utc::now(),
      },
    );
    Ok(())
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| Error::store(format!("failed to parse datetime '{}': {}", s, e)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[tokio::test]
  async fn sqlite_roundtrip_and_overwrite() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.open(&["issues"]).await.unwrap();

    let key = "https://jira.example.com/rest/api/latest/issue/10001";
    assert!(store.get(key, "issues").await.unwrap().is_none());

    store.put(key, &json!({"id": "10001", "v": 1}), "issues").await.unwrap();
    let stored = store.get(key, "issues").await.unwrap().unwrap();
    assert_eq!(stored.record["v"], 1);

    // A second put supersedes the record unconditionally.
    store.put(key, &json!({"id": "10001", "v": 2}), "issues").await.unwrap();
    let stored = store.get(key, "issues").await.unwrap().unwrap();
    assert_eq!(stored.record["v"], 2);
  }

  #[tokio::test]
  async fn sqlite_partitions_do_not_collide() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.open(&["issues", "changelogs"]).await.unwrap();

    store.put("k", &json!("issue"), "issues").await.unwrap();
    store.put("k", &json!("log"), "changelogs").await.unwrap();

    assert_eq!(store.get("k", "issues").await.unwrap().unwrap().record, json!("issue"));
    assert_eq!(
      store.get("k", "changelogs").await.unwrap().unwrap().record,
      json!("log")
    );
  }

  #[tokio::test]
  async fn from_config_honors_the_configured_db_path() {
    let path = std::env::temp_dir().join(format!("jira-cache-test-{}.db", std::process::id()));
    let _ = std::fs::remove_file(&path);

    let mut config = Config::new("https://jira.example.com");
    config.cache.db_path = Some(path.clone());

    let store = SqliteStore::from_config(&config).unwrap();
    store.open(&["issues"]).await.unwrap();
    store.put("k", &json!(1), "issues").await.unwrap();
    drop(store);

    // A second store built from the same config sees the record, so the
    // configured path really is where the database lives.
    let reopened = SqliteStore::from_config(&config).unwrap();
    reopened.open(&["issues"]).await.unwrap();
    assert_eq!(reopened.get("k", "issues").await.unwrap().unwrap().record, json!(1));

    let _ = std::fs::remove_file(&path);
  }

  #[tokio::test]
  async fn memory_store_shares_state_across_clones() {
    let store = MemoryStore::new();
    let observer = store.clone();

    store.put("k", &json!(42), "issues").await.unwrap();
    assert_eq!(observer.get("k", "issues").await.unwrap().unwrap().record, json!(42));
  }
}
