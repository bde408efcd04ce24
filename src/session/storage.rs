//! Session cache backends: SQLite (durable) and in-memory.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use super::traits::{SessionCache, SessionKey, SessionSnapshot};

/// Cache that lives only as long as the process.
#[derive(Default)]
pub struct MemorySessionCache {
  values: Mutex<HashMap<SessionKey, String>>,
}

impl MemorySessionCache {
  pub fn new() -> Self {
    Self::default()
  }
}

impl SessionCache for MemorySessionCache {
  fn snapshot(&self) -> Result<SessionSnapshot> {
    let values = self
      .values
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(SessionSnapshot::from_lookup(|key| values.get(&key).cloned()))
  }

  fn store(&self, snapshot: &SessionSnapshot) -> Result<()> {
    let mut values = self
      .values
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    values.clear();
    values.extend(snapshot.entries());
    Ok(())
  }

  fn set_field(&self, key: SessionKey, value: &str) -> Result<()> {
    self
      .values
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?
      .insert(key, value.to_string());
    Ok(())
  }

  fn clear(&self) -> Result<()> {
    self
      .values
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?
      .clear();
    Ok(())
  }

  fn teardown(&self) -> Result<()> {
    Ok(())
  }
}

/// SQLite-backed session cache that survives restarts.
pub struct SqliteSessionCache {
  conn: Mutex<Option<Connection>>,
}

/// Schema for the session table.
const SESSION_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS session_cache (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl SqliteSessionCache {
  /// Open (or create) the session database at `path`.
  pub fn init(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create session directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open session database at {}: {}", path.display(), e))?;

    let cache = Self {
      conn: Mutex::new(Some(conn)),
    };
    cache.run_migrations()?;

    Ok(cache)
  }

  /// Open the session database at the default location.
  pub fn open_default() -> Result<Self> {
    let path = crate::config::data_dir()?.join("session.db");
    Self::init(&path)
  }

  fn run_migrations(&self) -> Result<()> {
    self.with_conn(|conn| {
      conn
        .execute_batch(SESSION_SCHEMA)
        .map_err(|e| eyre!("Failed to run session migrations: {}", e))
    })
  }

  fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
    let mut guard = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let conn = guard
      .as_mut()
      .ok_or_else(|| eyre!("Session cache has been torn down"))?;
    f(conn)
  }
}

impl SessionCache for SqliteSessionCache {
  fn snapshot(&self) -> Result<SessionSnapshot> {
    self.with_conn(|conn| {
      let mut stmt = conn
        .prepare("SELECT value FROM session_cache WHERE key = ?")
        .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

      let mut values = HashMap::new();
      for key in SessionKey::ALL {
        let value: Option<String> = stmt
          .query_row(params![key.as_str()], |row| row.get(0))
          .optional()
          .map_err(|e| eyre!("Failed to read session key {}: {}", key.as_str(), e))?;
        if let Some(value) = value {
          values.insert(key, value);
        }
      }

      Ok(SessionSnapshot::from_lookup(|key| values.remove(&key)))
    })
  }

  fn store(&self, snapshot: &SessionSnapshot) -> Result<()> {
    self.with_conn(|conn| {
      let tx = conn
        .transaction()
        .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

      tx.execute("DELETE FROM session_cache", [])
        .map_err(|e| eyre!("Failed to clear session: {}", e))?;

      for (key, value) in snapshot.entries() {
        tx.execute(
          "INSERT INTO session_cache (key, value, updated_at) VALUES (?, ?, datetime('now'))",
          params![key.as_str(), value],
        )
        .map_err(|e| eyre!("Failed to store session key {}: {}", key.as_str(), e))?;
      }

      tx.commit()
        .map_err(|e| eyre!("Failed to commit transaction: {}", e))
    })
  }

  fn set_field(&self, key: SessionKey, value: &str) -> Result<()> {
    self.with_conn(|conn| {
      conn
        .execute(
          "INSERT OR REPLACE INTO session_cache (key, value, updated_at)
           VALUES (?, ?, datetime('now'))",
          params![key.as_str(), value],
        )
        .map_err(|e| eyre!("Failed to store session key {}: {}", key.as_str(), e))?;
      Ok(())
    })
  }

  fn clear(&self) -> Result<()> {
    self.with_conn(|conn| {
      conn
        .execute("DELETE FROM session_cache", [])
        .map_err(|e| eyre!("Failed to clear session: {}", e))?;
      Ok(())
    })
  }

  fn teardown(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?
      .take();

    match conn {
      Some(conn) => conn
        .close()
        .map_err(|(_, e)| eyre!("Failed to close session database: {}", e)),
      None => Ok(()),
    }
  }
}
