//! Schema for the persistent store.
//!
//! Each entry in `MIGRATIONS` moves `PRAGMA user_version` up by one. Entries
//! may only add tables or indexes, never drop or rewrite existing ones.

use rusqlite::Connection;
use tracing::debug;

use crate::error::Result;

pub const MIGRATIONS: &[&str] = &[
  // 1: record collections
  r#"
CREATE TABLE IF NOT EXISTS restaurants (
    id INTEGER PRIMARY KEY,
    data BLOB NOT NULL,
    stored_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS reviews (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    restaurant_id INTEGER,
    data BLOB NOT NULL,
    stored_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_reviews_restaurant_id ON reviews(restaurant_id);

CREATE TABLE IF NOT EXISTS pending_reviews (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    restaurant_id INTEGER,
    data BLOB NOT NULL,
    stored_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_pending_reviews_restaurant_id ON pending_reviews(restaurant_id);
"#,
  // 2: deferred sync requests
  r#"
CREATE TABLE IF NOT EXISTS sync_requests (
    tag TEXT PRIMARY KEY,
    registered_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#,
];

/// Bring the schema up to date. Safe to call on every open.
pub fn migrate(conn: &mut Connection) -> Result<()> {
  let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

  for (idx, sql) in MIGRATIONS.iter().enumerate() {
    let version = idx as i64 + 1;
    if version <= current {
      continue;
    }

    let tx = conn.transaction()?;
    tx.execute_batch(sql)?;
    tx.pragma_update(None, "user_version", version)?;
    tx.commit()?;
    debug!("Store schema migrated to version {}", version);
  }

  Ok(())
}
