//! Store traits and SQLite implementation.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

use super::schema;
use super::traits::{Collection, Deleted, Index, Record};
use crate::error::{Error, Result};

/// Trait for persistent record storage backends.
///
/// Reads return `None`/empty when nothing is stored, never an error. A backend
/// without storage capability behaves as an always-empty store.
pub trait RecordStore: Send + Sync {
  /// Whether records written here survive a restart.
  fn is_available(&self) -> bool;

  /// Get a record by primary key.
  fn get_by_id<T: Record>(&self, id: i64) -> Result<Option<T>>;

  /// Get every record of a collection, ordered by id.
  fn get_all<T: Record>(&self) -> Result<Vec<T>>;

  /// Get every record whose secondary index equals `value`.
  fn get_all_by_index<T: Record>(&self, index: Index, value: i64) -> Result<Vec<T>>;

  /// Insert or replace a record, returning its id.
  ///
  /// Returns `None` when the store is unavailable.
  fn put<T: Record>(&self, record: &T) -> Result<Option<i64>>;

  /// Upsert many records in one transaction.
  fn put_all<T: Record>(&self, records: &[T]) -> Result<usize>;

  /// Delete a record by primary key.
  fn delete(&self, collection: Collection, id: i64) -> Result<Deleted>;
}

/// Durable list of registered deferred-sync tags.
pub trait SyncLedger: Send + Sync {
  /// Register a tag. Returns false if it was already registered.
  fn register_sync(&self, tag: &str) -> Result<bool>;

  /// All registered tags in registration order.
  fn sync_tags(&self) -> Result<Vec<String>>;

  /// Forget a tag. Unknown tags are ignored.
  fn clear_sync(&self, tag: &str) -> Result<()>;
}

/// Storage implementation that doesn't store anything.
/// Used when no persistent storage is available - all operations are no-ops.
pub struct NoopStore;

impl RecordStore for NoopStore {
  fn is_available(&self) -> bool {
    false
  }

  fn get_by_id<T: Record>(&self, _id: i64) -> Result<Option<T>> {
    Ok(None) // Always miss
  }

  fn get_all<T: Record>(&self) -> Result<Vec<T>> {
    Ok(Vec::new())
  }

  fn get_all_by_index<T: Record>(&self, _index: Index, _value: i64) -> Result<Vec<T>> {
    Ok(Vec::new())
  }

  fn put<T: Record>(&self, _record: &T) -> Result<Option<i64>> {
    Ok(None) // Discard
  }

  fn put_all<T: Record>(&self, _records: &[T]) -> Result<usize> {
    Ok(0)
  }

  fn delete(&self, _collection: Collection, _id: i64) -> Result<Deleted> {
    Ok(Deleted::NotFound)
  }
}

impl SyncLedger for NoopStore {
  fn register_sync(&self, _tag: &str) -> Result<bool> {
    Err(Error::StorageUnavailable)
  }

  fn sync_tags(&self) -> Result<Vec<String>> {
    Ok(Vec::new())
  }

  fn clear_sync(&self, _tag: &str) -> Result<()> {
    Ok(())
  }
}

/// SQLite-based record store.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open or create the store at `path`, running any missing migrations.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;
    Self::from_connection(conn)
  }

  /// Open an in-memory store (useful for testing)
  #[allow(dead_code)]
  pub fn open_in_memory() -> Result<Self> {
    Self::from_connection(Connection::open_in_memory()?)
  }

  fn from_connection(mut conn: Connection) -> Result<Self> {
    schema::migrate(&mut conn)?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|_| Error::StorageUnavailable)
  }
}

/// Insert or replace one record inside an open transaction.
fn write_record<T: Record>(conn: &Connection, record: &T) -> Result<i64> {
  let collection = T::COLLECTION;
  let table = collection.table();

  let id = match record.id() {
    Some(id) => id,
    None if collection.auto_increment() => {
      // Reserve the id first so the stored JSON carries it
      conn.execute(
        &format!("INSERT INTO {} (data) VALUES (?1)", table),
        params![Vec::<u8>::new()],
      )?;
      conn.last_insert_rowid()
    }
    None => {
      return Err(Error::InvalidInput(format!(
        "records in {} need an id",
        table
      )))
    }
  };

  let mut record = record.clone();
  record.assign_id(id);
  let data = serde_json::to_vec(&record)?;

  match collection.index() {
    Some(index) => conn.execute(
      &format!(
        "INSERT OR REPLACE INTO {} (id, {}, data, stored_at) VALUES (?1, ?2, ?3, datetime('now'))",
        table,
        index.column()
      ),
      params![id, record.index_value(index), data],
    )?,
    None => conn.execute(
      &format!(
        "INSERT OR REPLACE INTO {} (id, data, stored_at) VALUES (?1, ?2, datetime('now'))",
        table
      ),
      params![id, data],
    )?,
  };

  Ok(id)
}

fn decode_rows<T: Record>(rows: Vec<Vec<u8>>) -> Vec<T> {
  rows
    .into_iter()
    .filter_map(|data| match serde_json::from_slice(&data) {
      Ok(record) => Some(record),
      Err(e) => {
        warn!("Skipping unreadable {} record: {}", T::COLLECTION.table(), e);
        None
      }
    })
    .collect()
}

impl RecordStore for SqliteStore {
  fn is_available(&self) -> bool {
    true
  }

  fn get_by_id<T: Record>(&self, id: i64) -> Result<Option<T>> {
    let conn = self.lock()?;
    let data: Option<Vec<u8>> = conn
      .query_row(
        &format!("SELECT data FROM {} WHERE id = ?1", T::COLLECTION.table()),
        params![id],
        |row| row.get(0),
      )
      .optional()?;

    match data {
      Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
      None => Ok(None),
    }
  }

  fn get_all<T: Record>(&self) -> Result<Vec<T>> {
    let conn = self.lock()?;
    let mut stmt = conn.prepare(&format!(
      "SELECT data FROM {} ORDER BY id",
      T::COLLECTION.table()
    ))?;
    let rows = stmt
      .query_map([], |row| row.get::<_, Vec<u8>>(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(decode_rows(rows))
  }

  fn get_all_by_index<T: Record>(&self, index: Index, value: i64) -> Result<Vec<T>> {
    let collection = T::COLLECTION;
    if collection.index() != Some(index) {
      return Err(Error::InvalidInput(format!(
        "{} has no index on {}",
        collection.table(),
        index.column()
      )));
    }

    let conn = self.lock()?;
    let mut stmt = conn.prepare(&format!(
      "SELECT data FROM {} WHERE {} = ?1 ORDER BY id",
      collection.table(),
      index.column()
    ))?;
    let rows = stmt
      .query_map(params![value], |row| row.get::<_, Vec<u8>>(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(decode_rows(rows))
  }

  fn put<T: Record>(&self, record: &T) -> Result<Option<i64>> {
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    let id = write_record(&tx, record)?;
    tx.commit()?;
    Ok(Some(id))
  }

  fn put_all<T: Record>(&self, records: &[T]) -> Result<usize> {
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    for record in records {
      write_record(&tx, record)?;
    }
    tx.commit()?;
    Ok(records.len())
  }

  fn delete(&self, collection: Collection, id: i64) -> Result<Deleted> {
    let conn = self.lock()?;
    let removed = conn.execute(
      &format!("DELETE FROM {} WHERE id = ?1", collection.table()),
      params![id],
    )?;

    Ok(if removed == 0 {
      Deleted::NotFound
    } else {
      Deleted::Removed
    })
  }
}

impl SyncLedger for SqliteStore {
  fn register_sync(&self, tag: &str) -> Result<bool> {
    let conn = self.lock()?;
    let inserted = conn.execute(
      "INSERT OR IGNORE INTO sync_requests (tag, registered_at) VALUES (?1, datetime('now'))",
      params![tag],
    )?;
    Ok(inserted > 0)
  }

  fn sync_tags(&self) -> Result<Vec<String>> {
    let conn = self.lock()?;
    let mut stmt = conn.prepare("SELECT tag FROM sync_requests ORDER BY rowid")?;
    let tags = stmt
      .query_map([], |row| row.get(0))?
      .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(tags)
  }

  fn clear_sync(&self, tag: &str) -> Result<()> {
    let conn = self.lock()?;
    conn.execute("DELETE FROM sync_requests WHERE tag = ?1", params![tag])?;
    Ok(())
  }
}

/// The store the application actually runs with.
///
/// Opening never fails: without a usable database the store degrades to
/// `NoopStore` and callers see "no cached data".
pub enum LocalStore {
  Sqlite(SqliteStore),
  Unavailable(NoopStore),
}

impl LocalStore {
  pub fn open(path: &Path) -> Self {
    match SqliteStore::open(path) {
      Ok(store) => LocalStore::Sqlite(store),
      Err(e) => {
        warn!(
          "Persistent store unavailable at {}: {}. Running network-only.",
          path.display(),
          e
        );
        LocalStore::Unavailable(NoopStore)
      }
    }
  }
}

impl RecordStore for LocalStore {
  fn is_available(&self) -> bool {
    match self {
      LocalStore::Sqlite(s) => s.is_available(),
      LocalStore::Unavailable(s) => s.is_available(),
    }
  }

  fn get_by_id<T: Record>(&self, id: i64) -> Result<Option<T>> {
    match self {
      LocalStore::Sqlite(s) => s.get_by_id(id),
      LocalStore::Unavailable(s) => s.get_by_id(id),
    }
  }

  fn get_all<T: Record>(&self) -> Result<Vec<T>> {
    match self {
      LocalStore::Sqlite(s) => s.get_all(),
      LocalStore::Unavailable(s) => s.get_all(),
    }
  }

  fn get_all_by_index<T: Record>(&self, index: Index, value: i64) -> Result<Vec<T>> {
    match self {
      LocalStore::Sqlite(s) => s.get_all_by_index(index, value),
      LocalStore::Unavailable(s) => s.get_all_by_index(index, value),
    }
  }

  fn put<T: Record>(&self, record: &T) -> Result<Option<i64>> {
    match self {
      LocalStore::Sqlite(s) => s.put(record),
      LocalStore::Unavailable(s) => s.put(record),
    }
  }

  fn put_all<T: Record>(&self, records: &[T]) -> Result<usize> {
    match self {
      LocalStore::Sqlite(s) => s.put_all(records),
      LocalStore::Unavailable(s) => s.put_all(records),
    }
  }

  fn delete(&self, collection: Collection, id: i64) -> Result<Deleted> {
    match self {
      LocalStore::Sqlite(s) => s.delete(collection, id),
      LocalStore::Unavailable(s) => s.delete(collection, id),
    }
  }
}

impl SyncLedger for LocalStore {
  fn register_sync(&self, tag: &str) -> Result<bool> {
    match self {
      LocalStore::Sqlite(s) => s.register_sync(tag),
      LocalStore::Unavailable(s) => s.register_sync(tag),
    }
  }

  fn sync_tags(&self) -> Result<Vec<String>> {
    match self {
      LocalStore::Sqlite(s) => s.sync_tags(),
      LocalStore::Unavailable(s) => s.sync_tags(),
    }
  }

  fn clear_sync(&self, tag: &str) -> Result<()> {
    match self {
      LocalStore::Sqlite(s) => s.clear_sync(tag),
      LocalStore::Unavailable(s) => s.clear_sync(tag),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::{LatLng, Restaurant, Review};
  use pretty_assertions::assert_eq;
  use std::collections::BTreeMap;

  fn restaurant(id: i64, name: &str) -> Restaurant {
    Restaurant {
      id,
      name: name.to_string(),
      neighborhood: "Manhattan".to_string(),
      cuisine_type: "Asian".to_string(),
      address: "171 E Broadway".to_string(),
      latlng: LatLng {
        lat: 40.713829,
        lng: -73.989667,
      },
      photograph: Some(id.to_string()),
      operating_hours: BTreeMap::new(),
      is_favorite: false,
    }
  }

  fn review(id: i64, restaurant_id: i64) -> Review {
    Review {
      id,
      restaurant_id,
      name: "Steve".to_string(),
      rating: 4,
      comments: "Good".to_string(),
      created_at: 1504095567183,
      updated_at: 1504095567183,
    }
  }

  #[test]
  fn test_put_then_get_by_id() {
    let store = SqliteStore::open_in_memory().unwrap();
    let id = store.put(&restaurant(1, "Mission Chinese Food")).unwrap();
    assert_eq!(id, Some(1));

    let loaded: Restaurant = store.get_by_id(1).unwrap().unwrap();
    assert_eq!(loaded, restaurant(1, "Mission Chinese Food"));
  }

  #[test]
  fn test_missing_record_is_none() {
    let store = SqliteStore::open_in_memory().unwrap();
    let loaded: Option<Restaurant> = store.get_by_id(42).unwrap();
    assert!(loaded.is_none());
  }

  #[test]
  fn test_put_all_is_an_upsert() {
    let store = SqliteStore::open_in_memory().unwrap();
    let list = vec![restaurant(1, "A"), restaurant(2, "B")];
    store.put_all(&list).unwrap();
    store.put_all(&list).unwrap();

    let all: Vec<Restaurant> = store.get_all().unwrap();
    assert_eq!(all, list);
  }

  #[test]
  fn test_get_all_by_index_filters_on_restaurant() {
    let store = SqliteStore::open_in_memory().unwrap();
    store
      .put_all(&[review(1, 1), review(2, 2), review(3, 1)])
      .unwrap();

    let for_one: Vec<Review> = store.get_all_by_index(Index::RestaurantId, 1).unwrap();
    let ids: Vec<i64> = for_one.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 3]);
  }

  #[test]
  fn test_get_all_by_index_rejects_unindexed_collection() {
    let store = SqliteStore::open_in_memory().unwrap();
    let result: Result<Vec<Restaurant>> = store.get_all_by_index(Index::RestaurantId, 1);
    assert!(matches!(result, Err(Error::InvalidInput(_))));
  }

  #[test]
  fn test_delete_twice_reports_not_found() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.put(&restaurant(5, "E")).unwrap();

    assert_eq!(
      store.delete(Collection::Restaurants, 5).unwrap(),
      Deleted::Removed
    );
    assert_eq!(
      store.delete(Collection::Restaurants, 5).unwrap(),
      Deleted::NotFound
    );
  }

  #[test]
  fn test_reopen_keeps_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("store.db");

    {
      let store = SqliteStore::open(&path).unwrap();
      store.put(&restaurant(1, "Kept")).unwrap();
      store.register_sync("syncReview_1").unwrap();
    }

    let store = SqliteStore::open(&path).unwrap();
    let loaded: Option<Restaurant> = store.get_by_id(1).unwrap();
    assert_eq!(loaded.map(|r| r.name), Some("Kept".to_string()));
    assert_eq!(store.sync_tags().unwrap(), vec!["syncReview_1".to_string()]);
  }

  #[test]
  fn test_noop_store_is_always_empty() {
    let store = NoopStore;
    assert!(!store.is_available());
    assert_eq!(store.put(&restaurant(1, "A")).unwrap(), None);

    let loaded: Option<Restaurant> = store.get_by_id(1).unwrap();
    assert!(loaded.is_none());
    let all: Vec<Restaurant> = store.get_all().unwrap();
    assert!(all.is_empty());
    assert_eq!(
      store.delete(Collection::Restaurants, 1).unwrap(),
      Deleted::NotFound
    );
  }

  #[test]
  fn test_local_store_degrades_when_path_is_unusable() {
    let dir = tempfile::tempdir().unwrap();
    // A directory cannot be opened as a database file
    let store = LocalStore::open(dir.path());
    assert!(!store.is_available());
    let all: Vec<Restaurant> = store.get_all().unwrap();
    assert!(all.is_empty());
  }

  #[test]
  fn test_sync_ledger_registers_once() {
    let store = SqliteStore::open_in_memory().unwrap();
    assert!(store.register_sync("syncReview_1").unwrap());
    assert!(!store.register_sync("syncReview_1").unwrap());
    assert!(store.register_sync("syncReview_2").unwrap());

    store.clear_sync("syncReview_1").unwrap();
    store.clear_sync("syncReview_9").unwrap();
    assert_eq!(store.sync_tags().unwrap(), vec!["syncReview_2".to_string()]);
  }
}
