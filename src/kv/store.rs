//! SQLite-backed store implementation.

use chrono::{Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::batch::WriteBatch;
use crate::error::{Error, Result};

/// Schema for the key-value table.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL DEFAULT '',
    expires_at INTEGER DEFAULT NULL
);
"#;

/// Durable key-value store over a single SQLite table.
///
/// Values are stored as JSON text; any serde-serializable type round-trips.
/// The connection is shared behind a mutex, so the store is safe to use
/// from concurrent in-process workers. Each `put` is durable on return;
/// use [`KvStore::batch`] plus [`KvStore::commit`] to group many writes
/// into one transaction.
pub struct KvStore {
  conn: Mutex<Connection>,
}

impl KvStore {
  /// Open or create the store at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;
    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;

    Ok(store)
  }

  /// In-memory store, used by tests.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()?;
    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;
    Ok(store)
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self.lock()?;
    conn.execute_batch(SCHEMA)?;
    Ok(())
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|_| Error::LockPoisoned)
  }

  /// Upsert `key`. With a TTL the entry expires `ttl` from now; without
  /// one it lives until deleted.
  pub fn put<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()> {
    let encoded = serde_json::to_string(value)?;
    let expires_at = expiry_timestamp(ttl);

    let conn = self.lock()?;
    conn.execute(
      "INSERT OR REPLACE INTO kv (key, value, expires_at) VALUES (?, ?, ?)",
      params![key, encoded, expires_at],
    )?;
    Ok(())
  }

  /// Read `key`. An entry whose expiry has passed reads as `None`.
  pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
    let now = Utc::now().timestamp();

    let conn = self.lock()?;
    let row: Option<String> = conn
      .prepare("SELECT value FROM kv WHERE key = ? AND (expires_at IS NULL OR expires_at > ?)")?
      .query_row(params![key, now], |row| row.get(0))
      .optional()?;

    match row {
      Some(encoded) => Ok(Some(serde_json::from_str(&encoded)?)),
      None => Ok(None),
    }
  }

  /// Read `key` with a factory default.
  ///
  /// With `persist_default` set, a miss writes the default back so later
  /// reads return the same value even before any explicit `put`. Used for
  /// settings that must be stable from first read.
  pub fn get_or<T>(&self, key: &str, default: T, persist_default: bool) -> Result<T>
  where
    T: Serialize + DeserializeOwned,
  {
    if let Some(value) = self.get(key)? {
      return Ok(value);
    }
    if persist_default {
      self.put(key, &default, None)?;
    }
    Ok(default)
  }

  /// All live entries whose key starts with `prefix`, ordered by stored
  /// value. Key order is not part of the contract.
  pub fn get_partial(&self, prefix: &str) -> Result<Vec<(String, Value)>> {
    let now = Utc::now().timestamp();

    let conn = self.lock()?;
    let mut stmt = conn.prepare(
      "SELECT key, value FROM kv WHERE key LIKE ? || '%' AND (expires_at IS NULL OR expires_at > ?) ORDER BY value",
    )?;
    let rows = stmt.query_map(params![prefix, now], |row| {
      Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut entries = Vec::new();
    for row in rows {
      let (key, encoded) = row?;
      entries.push((key, serde_json::from_str(&encoded)?));
    }
    Ok(entries)
  }

  /// Remove `key`. No error if it was absent.
  pub fn delete(&self, key: &str) -> Result<()> {
    let conn = self.lock()?;
    conn.execute("DELETE FROM kv WHERE key = ?", params![key])?;
    Ok(())
  }

  /// Remove every key under `prefix`. No error if nothing matched.
  pub fn delete_partial(&self, prefix: &str) -> Result<()> {
    let conn = self.lock()?;
    conn.execute("DELETE FROM kv WHERE key LIKE ? || '%'", params![prefix])?;
    Ok(())
  }

  /// Physically drop rows whose expiry has passed. Reads already treat
  /// them as absent; this reclaims space. Returns the number of rows
  /// removed.
  pub fn compact(&self) -> Result<usize> {
    let now = Utc::now().timestamp();
    let conn = self.lock()?;
    let removed = conn.execute(
      "DELETE FROM kv WHERE expires_at IS NOT NULL AND expires_at <= ?",
      params![now],
    )?;
    Ok(removed)
  }

  /// Start a batched write. Stage rows with [`WriteBatch::put`], then make
  /// them durable with [`KvStore::commit`].
  pub fn batch(&self) -> WriteBatch {
    WriteBatch::new()
  }

  /// Commit every staged row in one transaction. Readers see the whole
  /// batch or none of it.
  pub fn commit(&self, batch: WriteBatch) -> Result<()> {
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    for (key, encoded, expires_at) in batch.into_rows() {
      tx.execute(
        "INSERT OR REPLACE INTO kv (key, value, expires_at) VALUES (?, ?, ?)",
        params![key, encoded, expires_at],
      )?;
    }
    tx.commit()?;
    Ok(())
  }
}

/// Absolute expiry timestamp for a TTL measured from now.
pub(crate) fn expiry_timestamp(ttl: Option<Duration>) -> Option<i64> {
  ttl.map(|ttl| (Utc::now() + ttl).timestamp())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  #[test]
  fn put_then_get_round_trips() {
    let store = KvStore::open_in_memory().unwrap();
    store.put("photo.a.next", &"b", None).unwrap();
    assert_eq!(store.get::<String>("photo.a.next").unwrap().as_deref(), Some("b"));
  }

  #[test]
  fn last_write_wins() {
    let store = KvStore::open_in_memory().unwrap();
    store.put("settings.cache.days", &7, None).unwrap();
    store.put("settings.cache.days", &14, None).unwrap();
    assert_eq!(store.get::<i64>("settings.cache.days").unwrap(), Some(14));
  }

  #[test]
  fn expired_entry_reads_as_miss() {
    let store = KvStore::open_in_memory().unwrap();
    store.put("k", &"v", Some(Duration::seconds(-1))).unwrap();
    assert_eq!(store.get::<String>("k").unwrap(), None);
    // The row is still physically present until compaction.
    assert_eq!(store.compact().unwrap(), 1);
  }

  #[test]
  fn unexpired_ttl_entry_is_returned() {
    let store = KvStore::open_in_memory().unwrap();
    store.put("k", &"v", Some(Duration::seconds(3600))).unwrap();
    assert_eq!(store.get::<String>("k").unwrap().as_deref(), Some("v"));
    assert_eq!(store.compact().unwrap(), 0);
  }

  #[test]
  fn get_or_persists_the_default_on_request() {
    let store = KvStore::open_in_memory().unwrap();
    assert_eq!(store.get_or("settings.sync", false, true).unwrap(), false);
    // The default was written back, so a plain get now finds it.
    assert_eq!(store.get::<bool>("settings.sync").unwrap(), Some(false));

    assert_eq!(store.get_or("settings.other", 5, false).unwrap(), 5);
    assert_eq!(store.get::<i64>("settings.other").unwrap(), None);
  }

  #[test]
  fn get_partial_orders_by_value_and_skips_expired() {
    let store = KvStore::open_in_memory().unwrap();
    store.put("photo.a", &"zebra", None).unwrap();
    store.put("photo.b", &"apple", None).unwrap();
    store.put("photo.c", &"gone", Some(Duration::seconds(-1))).unwrap();

    let entries = store.get_partial("photo").unwrap();
    assert_eq!(entries.len(), 2);
    // Ordered by stored value, not by key.
    assert_eq!(entries[0].0, "photo.b");
    assert_eq!(entries[1].0, "photo.a");
  }

  #[test]
  fn delete_partial_is_namespace_scoped() {
    let store = KvStore::open_in_memory().unwrap();
    store.put("photo.a.next", &"b", None).unwrap();
    store.put("photo.b.previous", &"a", None).unwrap();
    store.put("album.x.name", &"holiday", None).unwrap();

    store.delete_partial("photo").unwrap();

    assert!(store.get_partial("photo").unwrap().is_empty());
    assert_eq!(
      store.get::<String>("album.x.name").unwrap().as_deref(),
      Some("holiday")
    );
  }

  #[test]
  fn delete_is_idempotent() {
    let store = KvStore::open_in_memory().unwrap();
    store.delete("never.here").unwrap();
    store.delete_partial("never").unwrap();
  }

  #[test]
  fn batch_commit_is_all_or_nothing() {
    let store = KvStore::open_in_memory().unwrap();

    let mut batch = store.batch();
    batch.put("photo.a.next", &"b", None).unwrap();
    batch.put("photo.b.previous", &"a", None).unwrap();

    // Nothing is visible before commit.
    assert!(store.get_partial("photo").unwrap().is_empty());

    store.commit(batch).unwrap();
    assert_eq!(store.get_partial("photo").unwrap().len(), 2);
  }

  #[test]
  fn failed_batch_leaves_nothing_visible() {
    let store = KvStore::open_in_memory().unwrap();

    let mut batch = store.batch();
    batch.put("photo.a.next", &"b", None).unwrap();
    // Maps with non-string keys cannot be encoded as JSON objects; the
    // staging call fails and the batch is abandoned uncommitted.
    let mut bad = HashMap::new();
    bad.insert((1, 2), "x");
    assert!(batch.put("photo.b.previous", &bad, None).is_err());
    drop(batch);

    assert!(store.get_partial("photo").unwrap().is_empty());
  }
}
