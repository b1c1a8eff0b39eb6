//! Write queue for reviews submitted while deferred sync is available.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::api::client::RemoteApi;
use crate::api::gateway::Gateway;
use crate::api::types::{NewReview, Review};
use crate::error::{Error, Result};
use crate::store::{Collection, Index, Record, RecordStore, SyncLedger};

use super::tag::SyncTag;

/// Lifecycle of a review write.
///
/// Queued path: `Created -> Queued -> SyncRequested -> Confirmed`.
/// Direct path: `Created -> SentDirectly -> Confirmed`.
/// Confirmed entries are removed from the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteState {
  Created,
  Queued,
  SyncRequested,
  SentDirectly,
  Confirmed,
}

impl WriteState {
  pub fn can_transition_to(&self, next: WriteState) -> bool {
    use WriteState::*;
    matches!(
      (self, next),
      (Created, Queued)
        | (Queued, SyncRequested)
        | (Queued, Confirmed)
        | (SyncRequested, Confirmed)
        | (Created, SentDirectly)
        | (SentDirectly, Confirmed)
    )
  }

  /// Move to `next`, rejecting transitions outside the lifecycle.
  pub fn advance(&mut self, next: WriteState) -> Result<()> {
    if !self.can_transition_to(next) {
      return Err(Error::InvalidInput(format!(
        "review write cannot go from {:?} to {:?}",
        self, next
      )));
    }
    *self = next;
    Ok(())
  }
}

/// A review waiting for the server to confirm it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingReview {
  /// Local id, assigned by the store on enqueue
  pub id: Option<i64>,
  pub review: NewReview,
  pub state: WriteState,
}

impl PendingReview {
  pub fn new(review: NewReview) -> Self {
    Self {
      id: None,
      review,
      state: WriteState::Created,
    }
  }

  /// The review as shown before the server confirms it.
  ///
  /// Server ids are positive, so the queue id is negated to keep the two
  /// apart until the review is reconciled.
  pub fn as_review(&self) -> Option<Review> {
    self.id.map(|id| self.review.with_id(local_review_id(id)))
  }

  /// Whether this entry still needs a delivery.
  pub fn is_outstanding(&self) -> bool {
    matches!(self.state, WriteState::Queued | WriteState::SyncRequested)
  }
}

/// Display id of the queued review with queue id `queue_id`.
pub fn local_review_id(queue_id: i64) -> i64 {
  -queue_id
}

impl Record for PendingReview {
  const COLLECTION: Collection = Collection::PendingReviews;

  fn id(&self) -> Option<i64> {
    self.id
  }

  fn assign_id(&mut self, id: i64) {
    self.id = Some(id);
  }

  fn index_value(&self, index: Index) -> Option<i64> {
    match index {
      Index::RestaurantId => Some(self.review.restaurant_id),
    }
  }
}

/// Platform capability that re-invokes a handler once connectivity returns.
pub trait DeferredSync: Send + Sync {
  /// Whether sync requests can be registered right now.
  fn is_active(&self) -> bool;

  /// Ask for a later delivery of `tag`.
  fn register(&self, tag: SyncTag) -> Result<()>;
}

/// Deferred sync backed by the store's durable tag ledger.
pub struct LedgerSync<S> {
  store: Arc<S>,
  enabled: bool,
}

impl<S: RecordStore + SyncLedger> LedgerSync<S> {
  pub fn new(store: Arc<S>, enabled: bool) -> Self {
    Self { store, enabled }
  }
}

impl<S: RecordStore + SyncLedger> DeferredSync for LedgerSync<S> {
  fn is_active(&self) -> bool {
    self.enabled && self.store.is_available()
  }

  fn register(&self, tag: SyncTag) -> Result<()> {
    if !self.store.register_sync(&tag.to_string())? {
      debug!("Sync {} was already registered", tag);
    }
    Ok(())
  }
}

/// What happened to a submitted review.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
  /// Stored locally and scheduled for sync. The review carries a negative
  /// local id so it can be shown right away next to server reviews.
  Queued { review: Review, tag: SyncTag },
  /// Deferred sync unavailable; the server accepted the review directly.
  SentDirectly(Review),
}

impl Submission {
  pub fn review(&self) -> &Review {
    match self {
      Submission::Queued { review, .. } => review,
      Submission::SentDirectly(review) => review,
    }
  }
}

/// Accepts review writes and routes them through the queue or directly.
pub struct ReviewQueue<A: RemoteApi, S: RecordStore, D> {
  gateway: Gateway<A, S>,
  sync: D,
}

impl<A, S, D> ReviewQueue<A, S, D>
where
  A: RemoteApi,
  S: RecordStore + 'static,
  D: DeferredSync,
{
  pub fn new(gateway: Gateway<A, S>, sync: D) -> Self {
    Self { gateway, sync }
  }

  /// Submit a review.
  ///
  /// With deferred sync active the review is queued and a sync request tagged
  /// `syncReview_<id>` is registered. Otherwise it is sent to the server and
  /// any failure is returned.
  pub async fn submit(&self, review: NewReview) -> Result<Submission> {
    if !self.sync.is_active() {
      return self.send_directly(review).await;
    }

    let mut pending = PendingReview::new(review);
    pending.state.advance(WriteState::Queued)?;

    let store = self.gateway.store();
    let id = store.put(&pending)?.ok_or(Error::StorageUnavailable)?;
    pending.id = Some(id);
    debug!("Queued review {} for restaurant {}", id, pending.review.restaurant_id);

    let tag = SyncTag::Review(id);
    if let Err(e) = self.sync.register(tag) {
      error!("Failed to register {}: {}", tag, e);
      // Unregistered entries would never be delivered
      if let Err(delete_err) = store.delete(Collection::PendingReviews, id) {
        warn!("Failed to drop unregistered review {}: {}", id, delete_err);
      }
      return Err(e);
    }

    pending.state.advance(WriteState::SyncRequested)?;
    store.put(&pending)?;
    info!("Review {} queued, sync requested as {}", id, tag);

    Ok(Submission::Queued {
      review: pending.review.with_id(local_review_id(id)),
      tag,
    })
  }

  async fn send_directly(&self, review: NewReview) -> Result<Submission> {
    let mut state = WriteState::Created;
    state.advance(WriteState::SentDirectly)?;

    let created = self.gateway.create_review(&review).await.map_err(|e| {
      error!("Failed to send review directly: {}", e);
      e
    })?;

    state.advance(WriteState::Confirmed)?;
    info!("Review {} created directly", created.id);
    Ok(Submission::SentDirectly(created))
  }

  /// Reviews still waiting for confirmation, oldest first.
  pub fn pending(&self) -> Result<Vec<PendingReview>> {
    self.gateway.store().get_all()
  }

  /// Pending reviews for one restaurant.
  pub fn pending_for(&self, restaurant_id: i64) -> Result<Vec<PendingReview>> {
    self
      .gateway
      .store()
      .get_all_by_index(Index::RestaurantId, restaurant_id)
  }
}
