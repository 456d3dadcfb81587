//! Durable key-value storage for state that must survive restarts.
//!
//! Session and UI preferences are each stored as one serialized record under
//! their own namespace. The resource cache is deliberately not persisted.

use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{ClientError, Result};

/// Trait for durable storage backends.
pub trait KeyValueStore: Send + Sync {
  /// Load the record stored under `namespace`, if any.
  fn load(&self, namespace: &str) -> Result<Option<Vec<u8>>>;

  /// Store `bytes` under `namespace`, replacing any previous record.
  fn save(&self, namespace: &str, bytes: &[u8]) -> Result<()>;

  /// Remove the record under `namespace`. Missing records are not an error.
  fn remove(&self, namespace: &str) -> Result<()>;
}

/// In-process store, used in tests and when persistence is disabled.
#[derive(Default)]
pub struct MemoryStore {
  records: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

fn poisoned<E: std::fmt::Display>(e: E) -> ClientError {
  ClientError::Storage(format!("Lock poisoned: {}", e))
}

impl KeyValueStore for MemoryStore {
  fn load(&self, namespace: &str) -> Result<Option<Vec<u8>>> {
    let records = self.records.lock().map_err(poisoned)?;
    Ok(records.get(namespace).cloned())
  }

  fn save(&self, namespace: &str, bytes: &[u8]) -> Result<()> {
    let mut records = self.records.lock().map_err(poisoned)?;
    records.insert(namespace.to_string(), bytes.to_vec());
    Ok(())
  }

  fn remove(&self, namespace: &str) -> Result<()> {
    let mut records = self.records.lock().map_err(poisoned)?;
    records.remove(namespace);
    Ok(())
  }
}

/// SQLite-based durable storage.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

const KV_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    namespace TEXT PRIMARY KEY,
    data BLOB NOT NULL,
    saved_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl SqliteStore {
  /// Open the store at `path`, or at the default location when `None`.
  pub fn open(path: Option<&Path>) -> Result<Self> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).map_err(|e| {
        ClientError::Storage(format!("Failed to create data directory: {}", e))
      })?;
    }

    let conn = Connection::open(&path).map_err(|e| {
      ClientError::Storage(format!(
        "Failed to open state database at {}: {}",
        path.display(),
        e
      ))
    })?;
    conn.execute_batch(KV_SCHEMA)?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    Ok(crate::config::data_dir()?.join("state.db"))
  }
}

impl KeyValueStore for SqliteStore {
  fn load(&self, namespace: &str) -> Result<Option<Vec<u8>>> {
    let conn = self.conn.lock().map_err(poisoned)?;
    let data = conn
      .query_row(
        "SELECT data FROM kv_store WHERE namespace = ?",
        params![namespace],
        |row| row.get::<_, Vec<u8>>(0),
      )
      .optional()?;
    Ok(data)
  }

  fn save(&self, namespace: &str, bytes: &[u8]) -> Result<()> {
    let conn = self.conn.lock().map_err(poisoned)?;
    conn.execute(
      "INSERT OR REPLACE INTO kv_store (namespace, data, saved_at)
       VALUES (?, ?, datetime('now'))",
      params![namespace, bytes],
    )?;
    Ok(())
  }

  fn remove(&self, namespace: &str) -> Result<()> {
    let conn = self.conn.lock().map_err(poisoned)?;
    conn.execute("DELETE FROM kv_store WHERE namespace = ?", params![namespace])?;
    Ok(())
  }
}
