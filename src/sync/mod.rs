//! Offline writes: the review queue, sync tags, replay on delivery, and
//! optimistic favorite toggles.

pub mod coordinator;
pub mod favorites;
pub mod queue;
pub mod tag;

pub use coordinator::{DrainReport, SyncCoordinator};
pub use favorites::{toggle_favorite, FavoriteOutcome};
pub use queue::{LedgerSync, ReviewQueue, Submission};
