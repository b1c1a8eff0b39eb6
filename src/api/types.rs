use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Geographic position of a restaurant
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
  pub lat: f64,
  pub lng: f64,
}

/// A restaurant as the rest of the application sees it.
///
/// `is_favorite` is always a real boolean here; the string form some servers
/// send is converted in `api_types`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
  pub id: i64,
  pub name: String,
  pub neighborhood: String,
  pub cuisine_type: String,
  pub address: String,
  pub latlng: LatLng,
  pub photograph: Option<String>,
  /// Day name -> opening hours text
  #[serde(default)]
  pub operating_hours: BTreeMap<String, String>,
  #[serde(default)]
  pub is_favorite: bool,
}

/// A review confirmed by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
  pub id: i64,
  pub restaurant_id: i64,
  pub name: String,
  pub rating: u8,
  pub comments: String,
  /// Epoch milliseconds
  pub created_at: i64,
  /// Epoch milliseconds
  pub updated_at: i64,
}

/// A review written locally that has no server id yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReview {
  pub restaurant_id: i64,
  pub name: String,
  pub rating: u8,
  pub comments: String,
  pub created_at: i64,
  pub updated_at: i64,
}

impl NewReview {
  /// Build a review stamped with the current time.
  pub fn new(
    restaurant_id: i64,
    name: impl Into<String>,
    rating: u8,
    comments: impl Into<String>,
  ) -> Result<Self> {
    let name = name.into().trim().to_string();
    if name.is_empty() {
      return Err(Error::InvalidInput("review name must not be empty".into()));
    }
    if !(1..=5).contains(&rating) {
      return Err(Error::InvalidInput(format!(
        "rating must be between 1 and 5, got {}",
        rating
      )));
    }

    let now = chrono::Utc::now().timestamp_millis();
    Ok(Self {
      restaurant_id,
      name,
      rating,
      comments: comments.into(),
      created_at: now,
      updated_at: now,
    })
  }

  /// Attach an id, e.g. the local queue id for optimistic display.
  pub fn with_id(&self, id: i64) -> Review {
    Review {
      id,
      restaurant_id: self.restaurant_id,
      name: self.name.clone(),
      rating: self.rating,
      comments: self.comments.clone(),
      created_at: self.created_at,
      updated_at: self.updated_at,
    }
  }
}
