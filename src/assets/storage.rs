//! Named cache buckets holding captured responses.
//!
//! Entries point at bodies by their SHA-256, so identical bodies are stored
//! once no matter how many keys or buckets refer to them.

use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::{Error, Result};

/// A captured response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetResponse {
  pub status: u16,
  pub content_type: Option<String>,
  pub body: Vec<u8>,
}

impl AssetResponse {
  #[cfg(test)]
  pub fn ok(content_type: &str, body: impl Into<Vec<u8>>) -> Self {
    Self {
      status: 200,
      content_type: Some(content_type.to_string()),
      body: body.into(),
    }
  }

  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// Schema for the asset cache.
const ASSET_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS buckets (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS entries (
    bucket TEXT NOT NULL,
    key TEXT NOT NULL,
    status INTEGER NOT NULL,
    content_type TEXT,
    body_hash TEXT NOT NULL,
    stored_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (bucket, key)
);

CREATE INDEX IF NOT EXISTS idx_entries_key ON entries(key);

CREATE TABLE IF NOT EXISTS blobs (
    hash TEXT PRIMARY KEY,
    body BLOB NOT NULL
);
"#;

pub struct AssetStore {
  conn: Mutex<Connection>,
}

impl AssetStore {
  pub fn open(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    Self::from_connection(Connection::open(path)?)
  }

  #[allow(dead_code)]
  pub fn open_in_memory() -> Result<Self> {
    Self::from_connection(Connection::open_in_memory()?)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    conn.execute_batch(ASSET_SCHEMA)?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|_| Error::StorageUnavailable)
  }

  /// Bucket names in creation order.
  pub fn bucket_names(&self) -> Result<Vec<String>> {
    let conn = self.lock()?;
    let mut stmt = conn.prepare("SELECT name FROM buckets ORDER BY rowid")?;
    let names = stmt
      .query_map([], |row| row.get(0))?
      .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
  }

  /// Create a bucket if it doesn't exist yet.
  #[cfg(test)]
  pub fn open_bucket(&self, name: &str) -> Result<()> {
    let conn = self.lock()?;
    conn.execute(
      "INSERT OR IGNORE INTO buckets (name) VALUES (?1)",
      params![name],
    )?;
    Ok(())
  }

  /// Delete a bucket with all of its entries. Returns false if it didn't exist.
  pub fn delete_bucket(&self, name: &str) -> Result<bool> {
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM entries WHERE bucket = ?1", params![name])?;
    let removed = tx.execute("DELETE FROM buckets WHERE name = ?1", params![name])?;
    drop_orphan_blobs(&tx)?;
    tx.commit()?;
    Ok(removed > 0)
  }

  /// Store one response under `key`, replacing any previous entry.
  pub fn put(&self, bucket: &str, key: &str, response: &AssetResponse) -> Result<()> {
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    write_entry(&tx, bucket, key, response)?;
    drop_orphan_blobs(&tx)?;
    tx.commit()?;
    Ok(())
  }

  /// Store several responses in one transaction.
  pub fn put_all(&self, bucket: &str, entries: &[(String, AssetResponse)]) -> Result<()> {
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    tx.execute(
      "INSERT OR IGNORE INTO buckets (name) VALUES (?1)",
      params![bucket],
    )?;
    for (key, response) in entries {
      write_entry(&tx, bucket, key, response)?;
    }
    drop_orphan_blobs(&tx)?;
    tx.commit()?;
    Ok(())
  }

  /// Look up `key` in one bucket.
  pub fn match_in(&self, bucket: &str, key: &str) -> Result<Option<AssetResponse>> {
    let conn = self.lock()?;
    let response = conn
      .query_row(
        "SELECT e.status, e.content_type, b.body FROM entries e
         INNER JOIN blobs b ON b.hash = e.body_hash
         WHERE e.bucket = ?1 AND e.key = ?2",
        params![bucket, key],
        read_response,
      )
      .optional()?;
    Ok(response)
  }

  /// Look up `key` in every bucket, oldest bucket first.
  pub fn match_any(&self, key: &str) -> Result<Option<AssetResponse>> {
    let conn = self.lock()?;
    let response = conn
      .query_row(
        "SELECT e.status, e.content_type, b.body FROM entries e
         INNER JOIN blobs b ON b.hash = e.body_hash
         INNER JOIN buckets k ON k.name = e.bucket
         WHERE e.key = ?1
         ORDER BY k.rowid
         LIMIT 1",
        params![key],
        read_response,
      )
      .optional()?;
    Ok(response)
  }

  /// Number of entries in a bucket.
  #[cfg(test)]
  pub fn entry_count(&self, bucket: &str) -> Result<usize> {
    let conn = self.lock()?;
    let count: i64 = conn.query_row(
      "SELECT COUNT(*) FROM entries WHERE bucket = ?1",
      params![bucket],
      |row| row.get(0),
    )?;
    Ok(count as usize)
  }

  /// Make every entry read and write fail.
  #[cfg(test)]
  pub fn break_entries(&self) {
    self
      .lock()
      .unwrap()
      .execute_batch("DROP TABLE entries")
      .unwrap();
  }

  #[cfg(test)]
  fn blob_count(&self) -> usize {
    let conn = self.lock().unwrap();
    conn
      .query_row("SELECT COUNT(*) FROM blobs", [], |row| row.get::<_, i64>(0))
      .unwrap() as usize
  }
}

fn write_entry(conn: &Connection, bucket: &str, key: &str, response: &AssetResponse) -> Result<()> {
  let hash = hex::encode(Sha256::digest(&response.body));

  conn.execute(
    "INSERT OR IGNORE INTO buckets (name) VALUES (?1)",
    params![bucket],
  )?;
  conn.execute(
    "INSERT OR IGNORE INTO blobs (hash, body) VALUES (?1, ?2)",
    params![hash, response.body],
  )?;
  conn.execute(
    "INSERT OR REPLACE INTO entries (bucket, key, status, content_type, body_hash, stored_at)
     VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'))",
    params![bucket, key, response.status, response.content_type, hash],
  )?;
  Ok(())
}

/// Remove bodies no entry points at anymore.
fn drop_orphan_blobs(conn: &Connection) -> Result<usize> {
  Ok(conn.execute(
    "DELETE FROM blobs WHERE hash NOT IN (SELECT body_hash FROM entries)",
    [],
  )?)
}

fn read_response(row: &rusqlite::Row<'_>) -> rusqlite::Result<AssetResponse> {
  Ok(AssetResponse {
    status: row.get(0)?,
    content_type: row.get(1)?,
    body: row.get(2)?,
  })
}
