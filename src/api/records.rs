//! Store implementations for API types.

use crate::store::{Collection, Index, Record};

use super::types::{Restaurant, Review};

impl Record for Restaurant {
  const COLLECTION: Collection = Collection::Restaurants;

  fn id(&self) -> Option<i64> {
    Some(self.id)
  }

  fn assign_id(&mut self, id: i64) {
    self.id = id;
  }

  fn index_value(&self, _index: Index) -> Option<i64> {
    // Restaurants have no secondary index
    None
  }
}

impl Record for Review {
  const COLLECTION: Collection = Collection::Reviews;

  fn id(&self) -> Option<i64> {
    Some(self.id)
  }

  fn assign_id(&mut self, id: i64) {
    self.id = id;
  }

  fn index_value(&self, index: Index) -> Option<i64> {
    match index {
      Index::RestaurantId => Some(self.restaurant_id),
    }
  }
}
