//! Replays queued writes when a sync request is delivered.
//!
//! The coordinator never retries on its own. A failed delivery is reported
//! and the tag stays registered, so the next delivery tries again. Every
//! handler is safe to run more than once for the same tag.

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api::client::RemoteApi;
use crate::api::gateway::Gateway;
use crate::api::types::Review;
use crate::error::{Error, Result};
use crate::store::{Collection, Deleted, RecordStore, SyncLedger};

use super::queue::{PendingReview, WriteState};
use super::tag::SyncTag;

/// Result of handling one delivered sync tag.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
  /// The queued review reached the server and left the queue
  Confirmed(Review),
  /// Nothing queued under this id; an earlier delivery already handled it
  AlreadyConfirmed,
  /// Tag belongs to some other feature
  Ignored,
}

/// Counts from one pass over the registered tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
  pub confirmed: usize,
  pub already_confirmed: usize,
  pub ignored: usize,
  pub invalid: usize,
  /// Tags left registered for the next delivery
  pub failed: usize,
  /// Outstanding entries that had no tag and were registered again
  pub recovered: usize,
}

impl DrainReport {
  fn record(&mut self, outcome: &SyncOutcome) {
    match outcome {
      SyncOutcome::Confirmed(review) => {
        debug!("Review {} is on the server", review.id);
        self.confirmed += 1;
      }
      SyncOutcome::AlreadyConfirmed => self.already_confirmed += 1,
      SyncOutcome::Ignored => self.ignored += 1,
    }
  }
}

pub struct SyncCoordinator<A: RemoteApi, S: RecordStore> {
  gateway: Gateway<A, S>,
}

impl<A, S> SyncCoordinator<A, S>
where
  A: RemoteApi,
  S: RecordStore + SyncLedger + 'static,
{
  pub fn new(gateway: Gateway<A, S>) -> Self {
    Self { gateway }
  }

  /// Handle one delivered sync event.
  ///
  /// Returns `Error::SyncDelivery` when the server could not be reached; the
  /// queued entry is kept for the next delivery.
  pub async fn handle_sync(&self, tag: &str) -> Result<SyncOutcome> {
    let id = match SyncTag::parse(tag)? {
      Some(SyncTag::Review(id)) => id,
      None => {
        debug!("Ignoring sync tag {}", tag);
        return Ok(SyncOutcome::Ignored);
      }
    };

    let store = self.gateway.store();
    let Some(mut pending) = store.get_by_id::<PendingReview>(id)? else {
      debug!("No queued review {}, nothing to sync", id);
      return Ok(SyncOutcome::AlreadyConfirmed);
    };
    if pending.state == WriteState::Confirmed {
      debug!("Queued review {} already reached the server", id);
      self.forget(id);
      return Ok(SyncOutcome::AlreadyConfirmed);
    }

    let created = self
      .gateway
      .create_review(&pending.review)
      .await
      .map_err(|e| Error::SyncDelivery {
        tag: tag.to_string(),
        reason: e.to_string(),
      })?;

    // The server has the review now; local bookkeeping failures must not
    // turn this into a redelivery
    info!("Queued review {} confirmed as review {}", id, created.id);
    pending.state.advance(WriteState::Confirmed)?;
    if !self.forget(id) {
      if let Err(e) = store.put(&pending) {
        warn!("Failed to mark queued review {} confirmed: {}", id, e);
      }
    }

    Ok(SyncOutcome::Confirmed(created))
  }

  /// Drop a confirmed queue entry. Returns false if it could not be removed.
  fn forget(&self, id: i64) -> bool {
    match self.gateway.store().delete(Collection::PendingReviews, id) {
      Ok(Deleted::Removed) => true,
      Ok(Deleted::NotFound) => {
        debug!("Queued review {} was already removed", id);
        true
      }
      Err(e) => {
        warn!("Failed to remove confirmed review {} from the queue: {}", id, e);
        false
      }
    }
  }

  /// Register a sync tag for every outstanding entry that lacks one.
  ///
  /// Covers entries written before a crash or a failed registration.
  fn register_untagged(&self) -> Result<usize> {
    let store = self.gateway.store();
    let registered = store.sync_tags()?;
    let mut added = 0;

    for pending in store.get_all::<PendingReview>()? {
      let Some(id) = pending.id else {
        continue;
      };
      if pending.state == WriteState::Confirmed {
        self.forget(id);
        continue;
      }
      if !pending.is_outstanding() {
        continue;
      }
      let tag = SyncTag::Review(id).to_string();
      if !registered.contains(&tag) && store.register_sync(&tag)? {
        info!("Registered missing sync {}", tag);
        added += 1;
      }
    }

    Ok(added)
  }

  /// Deliver every registered tag once.
  ///
  /// Tags that were handled (or can never be handled) are cleared; failed
  /// ones stay registered.
  pub async fn drain(&self) -> Result<DrainReport> {
    let store = self.gateway.store();
    let mut report = DrainReport {
      recovered: self.register_untagged()?,
      ..DrainReport::default()
    };

    for tag in store.sync_tags()? {
      match self.handle_sync(&tag).await {
        Ok(outcome) => {
          report.record(&outcome);
          store.clear_sync(&tag)?;
        }
        Err(Error::InvalidSyncTag(_)) => {
          warn!("Dropping malformed sync tag {}", tag);
          report.invalid += 1;
          store.clear_sync(&tag)?;
        }
        Err(e) => {
          warn!("Sync {} failed, will redeliver: {}", tag, e);
          report.failed += 1;
        }
      }
    }

    Ok(report)
  }

  /// Re-deliver registered tags every `every` until interrupted.
  pub async fn watch(&self, every: Duration) -> Result<()> {
    let mut ticker = tokio::time::interval(every);

    loop {
      tokio::select! {
        _ = ticker.tick() => {
          let report = self.drain().await?;
          if report != DrainReport::default() {
            info!("Sync pass: {:?}", report);
          }
        }
        _ = tokio::signal::ctrl_c() => {
          info!("Stopping sync watcher");
          return Ok(());
        }
      }
    }
  }
}
