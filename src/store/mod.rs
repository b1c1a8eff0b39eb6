//! Local persistent store for offline support.
//!
//! Mirrors server data and queues writes so they survive restarts:
//! - `restaurants` keyed by id
//! - `reviews` keyed by an auto-increment id, indexed by restaurant id
//! - `pending_reviews` holding writes not yet confirmed by the server
//! - a ledger of registered deferred-sync tags

mod schema;
mod storage;
mod traits;

pub use storage::{LocalStore, NoopStore, RecordStore, SqliteStore, SyncLedger};
pub use traits::{Collection, Deleted, Index, Record};
