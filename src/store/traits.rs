//! Core traits and types for the persistent store.

use serde::{de::DeserializeOwned, Serialize};

/// The named collections the store keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
  /// Keyed by restaurant id
  Restaurants,
  /// Keyed by an auto-increment id, indexed by restaurant id
  Reviews,
  /// Queued review writes, keyed by a locally assigned id
  PendingReviews,
}

impl Collection {
  pub fn table(&self) -> &'static str {
    match self {
      Collection::Restaurants => "restaurants",
      Collection::Reviews => "reviews",
      Collection::PendingReviews => "pending_reviews",
    }
  }

  /// Whether the store assigns ids to records that come without one.
  pub fn auto_increment(&self) -> bool {
    !matches!(self, Collection::Restaurants)
  }

  /// Secondary index maintained for this collection, if any.
  pub fn index(&self) -> Option<Index> {
    match self {
      Collection::Restaurants => None,
      Collection::Reviews | Collection::PendingReviews => Some(Index::RestaurantId),
    }
  }
}

/// Secondary indexes usable with `get_all_by_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Index {
  RestaurantId,
}

impl Index {
  pub fn column(&self) -> &'static str {
    match self {
      Index::RestaurantId => "restaurant_id",
    }
  }
}

/// Trait for records that can live in the persistent store.
pub trait Record: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
  /// Collection this record type belongs to
  const COLLECTION: Collection;

  /// Primary key, None when the store should assign one
  fn id(&self) -> Option<i64>;

  /// Called with the store-assigned id after an auto-increment insert
  fn assign_id(&mut self, id: i64);

  /// Value of a secondary index for this record
  fn index_value(&self, index: Index) -> Option<i64>;
}

/// Result of a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deleted {
  Removed,
  NotFound,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_only_review_collections_are_indexed() {
    assert_eq!(Collection::Restaurants.index(), None);
    assert_eq!(Collection::Reviews.index(), Some(Index::RestaurantId));
    assert_eq!(Collection::PendingReviews.index(), Some(Index::RestaurantId));
  }

  #[test]
  fn test_restaurants_require_explicit_ids() {
    assert!(!Collection::Restaurants.auto_increment());
    assert!(Collection::Reviews.auto_increment());
    assert!(Collection::PendingReviews.auto_increment());
  }
}
